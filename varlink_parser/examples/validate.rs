use std::env;
use std::error::Error;
use std::fs::File;
use std::io;
use std::io::prelude::*;
use std::path::Path;
use std::process::exit;
use varlink_parser::{Format, IDL};

fn main() -> Result<(), Box<dyn Error>> {
    let mut buffer = String::new();
    let args: Vec<_> = env::args().collect();

    match args.len() {
        0 | 1 => io::stdin().read_to_string(&mut buffer)?,
        _ => File::open(Path::new(&args[1]))?.read_to_string(&mut buffer)?,
    };

    let idl = match IDL::from_string(&buffer) {
        Ok(idl) => idl,
        Err(e) => {
            eprintln!("{}", e);
            exit(1);
        }
    };

    if let Err(e) = idl.validate() {
        eprintln!("{}", e);
        exit(1);
    }

    println!("{}", idl.get_multiline(0, 80));
    Ok(())
}

use crate::*;

fn is_valid(s: &str) -> bool {
    IDL::from_string(s).is_ok()
}

#[test]
fn test_standard() {
    let v = IDL::from_string(
        "
# The Varlink Service Interface is provided by every varlink service. It
# describes the service and the interfaces it implements.
interface org.varlink.service

# Get a list of all the interfaces a service provides and information
# about the implementation.
method GetInfo() -> (
vendor: string,
product: string,
version: string,
url: string,
interfaces: string[]
)

# Get the description of an interface that is implemented by this service.
method GetInterfaceDescription(interface: string) -> (description: string)

# The requested interface was not found.
error InterfaceNotFound (interface: string)

# The requested method was not found
error MethodNotFound (method: string)

# The interface defines the requested method, but the service does not
# implement it.
error MethodNotImplemented (method: string)

# One of the passed parameters is invalid.
error InvalidParameter (parameter: string)
",
    )
    .unwrap();
    assert_eq!(v.name, "org.varlink.service");
    assert_eq!(
        v.doc,
        "\
         The Varlink Service Interface is provided by every varlink service. It\n\
         describes the service and the interfaces it implements.\
         "
    );
    assert_eq!(
        v.methods.get("GetInterfaceDescription").unwrap().doc,
        "Get the description of an interface that is implemented by this service."
    );
    assert_eq!(
        v.methods.get("GetInfo").unwrap().output.fields()[4],
        Field {
            name: "interfaces".into(),
            vtype: VType::Array(Box::new(VType::String)),
        }
    );
    assert_eq!(v.errors.len(), 4);
    assert_eq!(
        v.members,
        vec![
            Member::Method("GetInfo".into()),
            Member::Method("GetInterfaceDescription".into()),
            Member::Error("InterfaceNotFound".into()),
            Member::Error("MethodNotFound".into()),
            Member::Error("MethodNotImplemented".into()),
            Member::Error("InvalidParameter".into()),
        ]
    );
    assert_eq!(
        v.to_string(),
        "\
# The Varlink Service Interface is provided by every varlink service. It
# describes the service and the interfaces it implements.
interface org.varlink.service

# Get a list of all the interfaces a service provides and information
# about the implementation.
method GetInfo() -> (
  vendor: string,
  product: string,
  version: string,
  url: string,
  interfaces: string[]
)

# Get the description of an interface that is implemented by this service.
method GetInterfaceDescription(interface: string) -> (description: string)

# The requested interface was not found.
error InterfaceNotFound (interface: string)

# The requested method was not found
error MethodNotFound (method: string)

# The interface defines the requested method, but the service does not
# implement it.
error MethodNotImplemented (method: string)

# One of the passed parameters is invalid.
error InvalidParameter (parameter: string)
"
    );
}

#[test]
fn test_complex() {
    let v = IDL::from_string(
        "interface org.example.complex
type TypeEnum ( a, b, c )

type TypeFoo (
bool: bool,
int: int,
float: float,
string: string,
enum: ( foo, bar, baz ),
type: TypeEnum,
anon: ( foo: bool, bar: int, baz: ( a: int, b: int) )
)

method Foo(a: (b: bool, c: int), foo: TypeFoo) -> (a: (b: bool, c: int), foo: TypeFoo)

error ErrorFoo (a: (b: bool, c: int), foo: TypeFoo)
",
    )
    .unwrap();
    assert_eq!(v.name, "org.example.complex");
    assert_eq!(
        v.typedefs.get("TypeEnum").unwrap().vtype,
        VType::Enum(vec!["a".into(), "b".into(), "c".into()])
    );
    assert_eq!(
        v.typedefs.get("TypeFoo").unwrap().vtype.fields()[5].vtype,
        VType::Alias("TypeEnum".into())
    );
    assert!(v.validate().is_ok());
    assert_eq!(
        v.to_string(),
        "\
interface org.example.complex

type TypeEnum (a, b, c)

type TypeFoo (
  bool: bool,
  int: int,
  float: float,
  string: string,
  enum: (foo, bar, baz),
  type: TypeEnum,
  anon: (foo: bool, bar: int, baz: (a: int, b: int))
)

method Foo(a: (b: bool, c: int), foo: TypeFoo) -> (
  a: (b: bool, c: int),
  foo: TypeFoo
)

error ErrorFoo (a: (b: bool, c: int), foo: TypeFoo)
"
    );
}

#[test]
fn test_formatted() {
    let v = IDL::from_string(
        "\
# 345678901234567890123456789012345678901234567890123456789012345678901234567890
interface org.example.format

type TypeFoo (enum: (foo, bar, sdfsdfsdfsdf, sdfsdfsefaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa),
enum2: (foo, bar, sdfsdfsdfsdf, sdfsdfsefaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa),
anon: (baz: (a: (foo: bool, bar: int, baz: (a: int, b: int), baz1: (a: int, bee: int)),
b: (foo: bool, bar: int, baz: (a: int, b: int), baz1: (a: int, beee: int)))))

method Foo(a: (b: bool, c: int), foo: bool) -> (a: (b: bool, c: int), foo: bool)

error ErrorFoo (a: (foo: bool, bar: int, baz: (a: int, b: int), b: (beee: int)))

error ErrorFoo1 (a: (foo: bool, bar: int, baz: (a: int, b: int), b: (beee: int)))
",
    )
    .unwrap();
    assert_eq!(v.name, "org.example.format");
    println!("{}", v.get_oneline());
    assert_eq!(
        v.to_string(),
        "\
# 345678901234567890123456789012345678901234567890123456789012345678901234567890
interface org.example.format

type TypeFoo (
  enum: (foo, bar, sdfsdfsdfsdf, sdfsdfsefaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa),
  enum2: (
    foo,
    bar,
    sdfsdfsdfsdf,
    sdfsdfsefaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa
  ),
  anon: (
    baz: (
      a: (foo: bool, bar: int, baz: (a: int, b: int), baz1: (a: int, bee: int)),
      b: (
        foo: bool,
        bar: int,
        baz: (a: int, b: int),
        baz1: (a: int, beee: int)
      )
    )
  )
)

method Foo(a: (b: bool, c: int), foo: bool) -> (a: (b: bool, c: int), foo: bool)

error ErrorFoo (a: (foo: bool, bar: int, baz: (a: int, b: int), b: (beee: int)))

error ErrorFoo1 (
  a: (foo: bool, bar: int, baz: (a: int, b: int), b: (beee: int))
)
"
    );

    let reparsed = IDL::from_string(&v.to_string()).unwrap();
    assert_eq!(reparsed.typedefs, v.typedefs);
    assert_eq!(reparsed.methods, v.methods);
    assert_eq!(reparsed.errors, v.errors);
    assert_eq!(reparsed.doc, v.doc);
}

#[test]
fn test_one_method() {
    assert!(is_valid("interface foo.bar\nmethod Foo()->()"));
}

#[test]
fn test_one_method_no_type() {
    let e = IDL::from_string("interface foo.bar\nmethod Foo()->(b:)").unwrap_err();
    assert_eq!(
        e.kind(),
        Some(&ErrorKind::MissingMethodOutput("Foo".into()))
    );
}

#[test]
fn test_domainnames() {
    assert!(is_valid("interface org.varlink.service\nmethod F()->()"));
    assert!(is_valid("interface com.example.0example\nmethod F()->()"));
    assert!(is_valid("interface com.example.example-dash\nmethod F()->()"));
    assert!(!is_valid("interface com.-example.leadinghyphen\nmethod F()->()"));
    assert!(is_valid("interface xn--lgbbat1ad8j.example.algeria\nmethod F()->()"));
    assert!(!is_valid("interface com.example-.danglinghyphen-\nmethod F()->()"));
    assert!(!is_valid("interface Com.example.uppercase-toplevel\nmethod F()->()"));
    assert!(!is_valid("interface Co9.example.number-toplevel\nmethod F()->()"));
    assert!(!is_valid("interface 1om.example.number-toplevel\nmethod F()->()"));
    assert!(!is_valid("interface com.Example\nmethod F()->()"));
    assert!(is_valid("interface a.b\nmethod F()->()"));
    assert!(is_valid("interface a.b.c\nmethod F()->()"));
    assert!(is_valid("interface a1.b1.c1\nmethod F()->()"));
    assert!(is_valid("interface a1.b--1.c--1\nmethod F()->()"));
    assert!(is_valid("interface a--1.b--1.c--1\nmethod F()->()"));
    assert!(is_valid("interface a.21.c\nmethod F()->()"));
    assert!(is_valid("interface a.1\nmethod F()->()"));
    assert!(is_valid("interface a.0.0\nmethod F()->()"));
    assert!(!is_valid("interface ab\nmethod F()->()"));
    assert!(!is_valid("interface .a.b.c\nmethod F()->()"));
    assert!(!is_valid("interface a.b.c.\nmethod F()->()"));
    assert!(!is_valid("interface a..b.c\nmethod F()->()"));
    assert!(!is_valid("interface 1.b.c\nmethod F()->()"));
    assert!(!is_valid("interface 8a.0.0\nmethod F()->()"));
    assert!(!is_valid("interface -a.b.c\nmethod F()->()"));
    assert!(!is_valid("interface a.b.c-\nmethod F()->()"));
    assert!(!is_valid("interface a.b-.c-\nmethod F()->()"));
    assert!(!is_valid("interface a.-b.c-\nmethod F()->()"));
    assert!(!is_valid("interface a.-.c\nmethod F()->()"));
    assert!(!is_valid("interface a.*.c\nmethod F()->()"));
    assert!(!is_valid("interface a.?\nmethod F()->()"));

    let long = format!("interface com.example.{}\nmethod F()->()", "a".repeat(250));
    assert!(!is_valid(&long));
    let e = IDL::from_string(&long).unwrap_err();
    assert_eq!(e.kind(), Some(&ErrorKind::InterfaceName));
}

#[test]
fn test_field_names() {
    assert!(!is_valid("interface foo.bar\ntype I (Test: bool)\nmethod F()->()"));
    assert!(is_valid("interface foo.bar\ntype I (_test: bool)\nmethod F()->()"));
    assert!(!is_valid("interface foo.bar\ntype I (Äest: bool)\nmethod F()->()"));
    assert!(!is_valid("interface foo.bar\ntype I (1test: bool)\nmethod F()->()"));
    assert!(is_valid("interface foo.bar\ntype I (test_1: bool)\nmethod F()->()"));
}

#[test]
fn test_type_no_args() {
    assert!(is_valid("interface foo.bar\n type I ()\nmethod F()->()"));
}

#[test]
fn test_type_one_arg() {
    assert!(is_valid("interface foo.bar\n type I (b:bool)\nmethod F()->()"));
}

#[test]
fn test_type_enum() {
    let v = IDL::from_string("interface foo.bar\n type I (b: (foo, bar, baz))\nmethod F()->()")
        .unwrap();
    assert_eq!(
        v.typedefs.get("I").unwrap().vtype.fields()[0].vtype,
        VType::Enum(vec!["foo".into(), "bar".into(), "baz".into()])
    );
    assert_eq!(v.typedefs.get("I").unwrap().vtype.kind(), TypeKind::Struct);
}

#[test]
fn test_type_enum_mixed() {
    assert!(!is_valid(
        "interface foo.bar\n type I (b: (foo, bar, baz : bool))\nmethod F()->()"
    ));
    assert!(!is_valid(
        "interface foo.bar\n type I (b: (foo: int, bar, baz))\nmethod F()->()"
    ));
}

#[test]
fn test_type_primitives() {
    let v = IDL::from_string(
        "interface foo.bar\ntype I (a: bool, b: int, c: float, d: string)\nmethod F()->()",
    )
    .unwrap();
    let kinds = v
        .typedefs
        .get("I")
        .unwrap()
        .vtype
        .fields()
        .iter()
        .map(|f| f.vtype.kind())
        .collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![TypeKind::Bool, TypeKind::Int, TypeKind::Float, TypeKind::String]
    );
}

#[test]
fn test_type_one_array() {
    assert!(is_valid("interface foo.bar\n type I (b:bool[])\nmethod  F()->()"));
    assert!(!is_valid("interface foo.bar\n type I (b:bool[ ])\nmethod  F()->()"));
    assert!(!is_valid("interface foo.bar\n type I (b:bool[1])\nmethod  F()->()"));
    assert!(!is_valid("interface foo.bar\n type I (b:bool[ 1 ])\nmethod  F()->()"));
    assert!(!is_valid("interface foo.bar\n type I (b:bool[ 1 1 ])\nmethod  F()->()"));
    assert!(!is_valid("interface foo.bar\n type I (b:bool [])\nmethod  F()->()"));
}

#[test]
fn test_type_nested_array() {
    let v = IDL::from_string("interface foo.bar\ntype I (b: string[][], c: (x: int)[])\nmethod F()->()")
        .unwrap();
    let t = &v.typedefs.get("I").unwrap().vtype;
    assert_eq!(
        t.fields()[0].vtype,
        VType::Array(Box::new(VType::Array(Box::new(VType::String))))
    );
    assert_eq!(
        t.fields()[1].vtype.element_type().map(VType::kind),
        Some(TypeKind::Struct)
    );
    assert_eq!(t.to_string(), "(b: string[][], c: (x: int)[])");
}

#[test]
fn test_format() {
    let v = IDL::from_string("interface foo.bar\ntype I(b:bool[])\nmethod  F()->()").unwrap();
    assert_eq!(
        v.to_string(),
        "interface foo.bar\n\ntype I (b: bool[])\n\nmethod F() -> ()\n"
    );
}

#[test]
fn test_no_method() {
    let e = IDL::from_string("interface foo.bar\ntype I ()\ntype J (a: I)").unwrap_err();
    assert_eq!(e, Error::NoMethod("foo.bar".into()));
}

#[test]
fn test_duplicate() {
    let e = IDL::from_string(
        "
interface foo.example
type Device()
type Device()
method F() -> ()
",
    )
    .unwrap_err();
    assert_eq!(
        e,
        Error::Syntax {
            kind: ErrorKind::Duplicate("Device".into()),
            line: 4,
            column: 1,
        }
    );

    let e = IDL::from_string("interface foo.example\nmethod F() -> ()\nmethod F() -> ()")
        .unwrap_err();
    assert_eq!(e.kind(), Some(&ErrorKind::Duplicate("F".into())));

    let e = IDL::from_string("interface foo.example\nmethod F() -> ()\nerror F ()").unwrap_err();
    assert_eq!(e.kind(), Some(&ErrorKind::Duplicate("F".into())));
}

#[test]
fn test_error_parameters() {
    let v = IDL::from_string(
        "interface foo.bar\nmethod F()->()\nerror Bare\nerror WithParams (reason: string)\n",
    )
    .unwrap();
    assert_eq!(v.errors.get("Bare").unwrap().parameters, None);
    assert_eq!(
        v.errors.get("WithParams").unwrap().parameters,
        Some(VType::Struct(vec![Field {
            name: "reason".into(),
            vtype: VType::String,
        }]))
    );
    assert_eq!(
        v.to_string(),
        "interface foo.bar\n\nmethod F() -> ()\n\nerror Bare\n\nerror WithParams (reason: string)\n"
    );

    // The parameters have to start on the line of the error name.
    let e = IDL::from_string("interface foo.bar\nmethod F()->()\nerror Bare\n(reason: string)")
        .unwrap_err();
    assert_eq!(
        e.kind(),
        Some(&ErrorKind::TrailingInput("(reason:".into()))
    );
}

#[test]
fn test_syntax_errors() {
    assert_eq!(
        IDL::from_string("method F()->()").unwrap_err().kind(),
        Some(&ErrorKind::MissingInterfaceKeyword)
    );
    assert_eq!(
        IDL::from_string("interface foo.bar\nmethod F() - > ()")
            .unwrap_err()
            .kind(),
        Some(&ErrorKind::MissingMethodOperator("F".into()))
    );
    assert_eq!(
        IDL::from_string("interface foo.bar\nmethod F -> ()")
            .unwrap_err()
            .kind(),
        Some(&ErrorKind::MissingMethodInput("F".into()))
    );
    assert_eq!(
        IDL::from_string("interface foo.bar\nmethod ()->()")
            .unwrap_err()
            .kind(),
        Some(&ErrorKind::MissingMethodName)
    );
    assert_eq!(
        IDL::from_string("interface foo.bar\nmethod F()->()\ntype T")
            .unwrap_err()
            .kind(),
        Some(&ErrorKind::MissingTypeDeclaration("T".into()))
    );
    assert_eq!(
        IDL::from_string("interface foo.bar\nmethod F()->()\nfoo Bar")
            .unwrap_err()
            .kind(),
        Some(&ErrorKind::UnknownKeyword("foo".into()))
    );
    assert_eq!(
        IDL::from_string("interface foo.bar\nmethod F()->()\n!!")
            .unwrap_err()
            .kind(),
        Some(&ErrorKind::TrailingInput("!!".into()))
    );
}

#[test]
fn test_error_position() {
    let e = IDL::from_string("interface foo.bar\n\nmethod F()->(b:)").unwrap_err();
    match e {
        Error::Syntax { line, .. } => assert_eq!(line, 3),
        _ => panic!("unexpected error: {}", e),
    }
    assert!(e.to_string().starts_with("missing output of method `F`"));
}

#[test]
fn test_comments() {
    let v = IDL::from_string(
        "# interface doc
interface foo.bar

# detached

# first line
#
# third line
method F()->()
  # indented
method G()->()

type T (
  # inside
  a: int
)
",
    )
    .unwrap();
    assert_eq!(v.doc, "interface doc");
    assert_eq!(v.methods.get("F").unwrap().doc, "first line\n\nthird line");
    assert_eq!(v.methods.get("G").unwrap().doc, "indented");
    assert_eq!(v.typedefs.get("T").unwrap().doc, "");
    assert_eq!(
        v.members,
        vec![
            Member::Method("F".into()),
            Member::Method("G".into()),
            Member::Typedef("T".into()),
        ]
    );
}

#[test]
fn test_crlf() {
    let v = IDL::from_string("# doc\r\ninterface foo.bar\r\n\r\n# F doc\r\nmethod F(a: int)->()\r\n")
        .unwrap();
    assert_eq!(v.doc, "doc");
    assert_eq!(v.methods.get("F").unwrap().doc, "F doc");
}

#[test]
fn test_alias_resolution() {
    let v = IDL::from_string(
        "interface foo.bar\ntype A (b: B[])\nmethod F(a: A) -> (c: C)\nerror E (d: D)",
    )
    .unwrap();
    assert_eq!(v.resolve_alias("A").unwrap().name, "A");
    assert_eq!(
        v.validate().unwrap_err(),
        Error::UnresolvedAlias {
            interface: "foo.bar".into(),
            name: "B".into(),
        }
    );

    let v = IDL::from_string("interface foo.bar\ntype A (b: int)\nmethod F(a: A) -> (c: A[])")
        .unwrap();
    assert!(v.validate().is_ok());
    assert!(v.resolve_alias("B").is_err());
}

#[test]
fn test_description_is_source() {
    let s = "interface foo.bar\n\n# F\nmethod F()->()\n";
    assert_eq!(IDL::from_string(s).unwrap().description, s);
}

#[test]
fn test_nesting_limit() {
    let nested_arrays = |n: usize| format!("interface foo.bar\ntype T int{}\nmethod F()->()", "[]".repeat(n));
    let nested_structs = |n: usize| {
        format!(
            "interface foo.bar\nmethod F(a: {}int{}) -> ()",
            "(a: ".repeat(n),
            ")".repeat(n)
        )
    };

    assert!(is_valid(&nested_arrays(32)));
    assert!(is_valid(&nested_structs(32)));

    for s in [nested_arrays(200_000), nested_structs(10_000)] {
        assert_eq!(
            IDL::from_string(&s).unwrap_err().kind(),
            Some(&ErrorKind::NestingTooDeep(parser::MAX_DEPTH))
        );
    }
}

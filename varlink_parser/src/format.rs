use std::fmt;

use crate::*;

/// Renders interface descriptions back into varlink IDL text.
///
/// `get_multiline` breaks parameter lists over several lines, indented by
/// `indent`, whenever the one-line form would not fit into `max` columns.
pub trait Format {
    fn get_oneline(&self) -> String;
    fn get_multiline(&self, indent: usize, max: usize) -> String;
}

fn format_doc(doc: &str, indent: usize) -> String {
    let mut f = String::new();
    for line in doc.split('\n') {
        if line.is_empty() {
            f += &format!("{:indent$}#\n", "", indent = indent);
        } else {
            f += &format!("{:indent$}# {}\n", "", line, indent = indent);
        }
    }
    f
}

fn format_list(elts: &[String], indent: usize) -> String {
    if elts.is_empty() {
        return "()".into();
    }

    let mut f = String::new();
    f += "(\n";
    f += &elts
        .iter()
        .map(|elt| format!("{:indent$}{}", "", elt, indent = indent + 2))
        .collect::<Vec<String>>()
        .join(",\n");
    f += &format!("\n{:indent$})", "", indent = indent);
    f
}

impl Format for VType {
    fn get_oneline(&self) -> String {
        match self {
            VType::Bool => "bool".into(),
            VType::Int => "int".into(),
            VType::Float => "float".into(),
            VType::String => "string".into(),
            VType::Alias(v) => v.clone(),
            VType::Array(v) => format!("{}[]", v.get_oneline()),
            VType::Struct(fields) => format!(
                "({})",
                fields
                    .iter()
                    .map(Field::get_oneline)
                    .collect::<Vec<String>>()
                    .join(", ")
            ),
            VType::Enum(names) => format!("({})", names.join(", ")),
        }
    }

    fn get_multiline(&self, indent: usize, max: usize) -> String {
        match self {
            VType::Array(v) => format!("{}[]", v.get_multiline(indent, max)),
            VType::Struct(fields) => {
                let elts = fields
                    .iter()
                    .map(|field| {
                        let line = field.get_oneline();
                        if line.len() + indent + 2 < max {
                            line
                        } else {
                            field.get_multiline(indent + 2, max)
                        }
                    })
                    .collect::<Vec<String>>();
                format_list(&elts, indent)
            }
            VType::Enum(names) => format_list(names, indent),
            _ => self.get_oneline(),
        }
    }
}

impl fmt::Display for VType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.get_oneline())
    }
}

impl Format for Field {
    fn get_oneline(&self) -> String {
        format!("{}: {}", self.name, self.vtype)
    }

    fn get_multiline(&self, indent: usize, max: usize) -> String {
        format!("{}: {}", self.name, self.vtype.get_multiline(indent, max))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.get_oneline())
    }
}

impl Typedef {
    fn format(&self, indent: usize, max: usize) -> String {
        let line = format!("{:indent$}type {} ", "", self.name, indent = indent);
        let elt_line = self.vtype.get_oneline();
        if line.len() + elt_line.len() <= max {
            format!("{}{}\n", line, elt_line)
        } else {
            format!("{}{}\n", line, self.vtype.get_multiline(indent, max))
        }
    }
}

impl Method {
    fn format(&self, indent: usize, max: usize) -> String {
        let m_line = format!("method {}", self.name);
        let m_input = self.input.get_oneline();
        let m_output = self.output.get_oneline();

        let (input, output) = if (m_line.len() + m_input.len() + m_output.len() + 4 <= max)
            || (m_input.len() + m_output.len() == 4)
        {
            (m_input, m_output)
        } else if (m_line.len() + m_input.len() + 6 <= max) || (m_input.len() == 2) {
            (m_input, self.output.get_multiline(indent, max))
        } else if m_output.len() + 7 <= max {
            (self.input.get_multiline(indent, max), m_output)
        } else {
            (
                self.input.get_multiline(indent, max),
                self.output.get_multiline(indent, max),
            )
        };

        format!(
            "{:indent$}{}{} -> {}\n",
            "",
            m_line,
            input,
            output,
            indent = indent
        )
    }
}

impl VError {
    fn format(&self, indent: usize, max: usize) -> String {
        let line = format!("{:indent$}error {}", "", self.name, indent = indent);
        match self.parameters {
            None => format!("{}\n", line),
            Some(ref p) => {
                let elt_line = p.get_oneline();
                if line.len() + elt_line.len() + 1 <= max {
                    format!("{} {}\n", line, elt_line)
                } else {
                    format!("{} {}\n", line, p.get_multiline(indent, max))
                }
            }
        }
    }
}

impl fmt::Display for IDL {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.get_multiline(0, 80))
    }
}

impl Format for IDL {
    /// Every declaration on a single line, whatever its length.
    fn get_oneline(&self) -> String {
        self.get_multiline(0, usize::MAX)
    }

    fn get_multiline(&self, indent: usize, max: usize) -> String {
        let mut f = String::new();

        if !self.doc.is_empty() {
            f += &format_doc(&self.doc, indent);
        }
        f += &format!("{:indent$}interface {}\n", "", self.name, indent = indent);

        for member in self.iter_members() {
            f += "\n";
            let (doc, decl) = match member {
                MemberRef::Typedef(t) => (&t.doc, t.format(indent, max)),
                MemberRef::Method(m) => (&m.doc, m.format(indent, max)),
                MemberRef::Error(e) => (&e.doc, e.format(indent, max)),
            };
            if !doc.is_empty() {
                f += &format_doc(doc, indent);
            }
            f += &decl;
        }
        f
    }
}

use baupipe::{Assembly, Printer};

/// Re-indents a compact JSON document.
///
/// Objects put every member on its own line; arrays stay attached to their
/// first element. Text inside strings, escaped quotes included, is copied
/// untouched.
pub fn pretty(json: &str, spacing: usize) -> String {
    let mut out = String::with_capacity(json.len() + json.len() / 4);
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    let newline = |out: &mut String, depth: usize| {
        out.push('\n');
        out.extend(core::iter::repeat_n(' ', depth * spacing));
    };

    for ch in json.chars() {
        if in_string {
            out.push(ch);
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            '{' => {
                depth += 1;
                out.push(ch);
                newline(&mut out, depth);
            }
            '[' => {
                depth += 1;
                out.push(ch);
            }
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                newline(&mut out, depth);
                out.push(ch);
            }
            ',' => {
                out.push(ch);
                newline(&mut out, depth);
            }
            ':' => out.push_str(": "),
            _ => out.push(ch),
        }
    }
    out
}

/// A [`Printer`] that re-indents every document before handing it on.
#[derive(Debug)]
pub struct PrettyPrinter<P> {
    inner: P,
    spacing: usize,
}

impl<P: Printer> PrettyPrinter<P> {
    pub const DEFAULT_SPACING: usize = 2;

    pub fn new(inner: P) -> Self {
        Self::with_spacing(inner, Self::DEFAULT_SPACING)
    }

    pub fn with_spacing(inner: P, spacing: usize) -> Self {
        Self { inner, spacing }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: Printer> Printer for PrettyPrinter<P> {
    fn print(&self, assembly: &Assembly) {
        self.inner
            .print(&Assembly::new(pretty(assembly.as_str(), self.spacing)));
    }
}

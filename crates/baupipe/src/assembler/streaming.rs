use crate::{Assembler, AssemblerError, AssemblerFactory, Assembly, AssemblyNode, Conversion};
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// The top-level bracket convention of a document.
///
/// `open`/`close` wrap the whole document and `separator` splits sibling
/// elements. The bracket text of nested levels comes from the
/// [`AssemblyNode`]s themselves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Brackets {
    pub open: String,
    pub close: String,
    pub separator: String,
}

impl Brackets {
    pub fn new(
        open: impl Into<String>,
        close: impl Into<String>,
        separator: impl Into<String>,
    ) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
            separator: separator.into(),
        }
    }

    /// Parses `open,close,separator`.
    ///
    /// A missing separator defaults to `,`. Params come from
    /// [`split_params`](crate::split_params), so a comma inside one of them
    /// is written `\,`.
    ///
    /// # Errors
    /// Returns [`AssemblerError::InvalidParams`] when fewer than two or more
    /// than three parameters are given.
    pub fn from_params(factory: &str, params: &[String]) -> Result<Self, AssemblerError> {
        match params {
            [open, close] => Ok(Self::new(open.as_str(), close.as_str(), ",")),
            [open, close, separator] => Ok(Self::new(
                open.as_str(),
                close.as_str(),
                separator.as_str(),
            )),
            _ => Err(AssemblerError::InvalidParams {
                factory: factory.to_owned(),
                reason: format!("expected `open,close[,separator]`, got {} params", params.len()),
            }),
        }
    }
}

impl Default for Brackets {
    fn default() -> Self {
        Self::new("{", "}", ",")
    }
}

/// A single forward-pass assembler.
///
/// Keeps only the stack of currently open levels plus, for every level a
/// conversion opened, that conversion's id. Nothing else about earlier
/// fragments is retained, so memory is bounded by nesting depth.
#[derive(Clone, Debug, Default)]
pub struct StreamingAssembler {
    brackets: Brackets,
}

impl StreamingAssembler {
    pub fn new(brackets: Brackets) -> Self {
        Self { brackets }
    }

    pub fn brackets(&self) -> &Brackets {
        &self.brackets
    }
}

impl Assembler for StreamingAssembler {
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self, conversions)))]
    fn assemble(
        &self,
        conversions: &mut dyn Iterator<Item = Conversion>,
        estimated_size: usize,
    ) -> Assembly {
        let capacity = estimated_size + estimated_size / 50;
        let mut pass = Pass::new(&self.brackets, capacity);
        pass.push_str(&self.brackets.open);
        if let Some(first) = conversions.next() {
            pass.open_new_levels(&first);
            pass.push_str(first.body());
        }
        for conversion in conversions {
            pass.include(&conversion);
        }
        pass.close_to(0);
        pass.push_str(&self.brackets.close);
        Assembly::new(pass.out)
    }
}

/// State of one [`StreamingAssembler::assemble`] call.
struct Pass<'a> {
    brackets: &'a Brackets,
    out: String,
    open: Vec<Arc<dyn AssemblyNode>>,
    /// `(conversion id, depth)` for each conversion that opened new levels.
    marks: Vec<(u64, usize)>,
}

impl<'a> Pass<'a> {
    fn new(brackets: &'a Brackets, capacity: usize) -> Self {
        Self {
            brackets,
            out: String::with_capacity(capacity),
            open: Vec::new(),
            marks: Vec::new(),
        }
    }

    fn push_str(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn include(&mut self, conversion: &Conversion) {
        let nodes = conversion.nodes();
        self.close_to(nodes.len());

        let repeated = self.is_repeated(conversion.id());
        let separator = match self.open.last() {
            Some(deepest) if repeated => {
                format!("{}{}{}", deepest.close(), self.brackets.separator, deepest.open())
            }
            _ => self.brackets.separator.clone(),
        };

        if !repeated {
            let shared = self
                .open
                .iter()
                .zip(nodes)
                .take_while(|(live, new)| live.unique_id() == new.unique_id())
                .count();
            self.close_to(shared);
        }

        self.out.push_str(&separator);
        self.open_new_levels(conversion);
        self.out.push_str(conversion.body());
    }

    /// The conversion that opened the deepest live level has the same id:
    /// the incoming fragment is another element of that level.
    fn is_repeated(&self, conversion: u64) -> bool {
        self.marks.last().is_some_and(|&(id, _)| id == conversion)
    }

    fn open_new_levels(&mut self, conversion: &Conversion) {
        let nodes = conversion.nodes();
        if nodes.len() > self.open.len() {
            self.marks.push((conversion.id(), nodes.len()));
        }
        for node in nodes.iter().skip(self.open.len()) {
            self.out.push_str(node.prefix());
            self.out.push_str(node.separator());
            self.out.push_str(node.pre_open());
            self.out.push_str(node.open());
            self.open.push(Arc::clone(node));
        }
    }

    fn close_to(&mut self, depth: usize) {
        while self.open.len() > depth {
            if let Some(node) = self.open.pop() {
                self.out.push_str(node.close());
                self.out.push_str(node.post_close());
            }
        }
        while self.marks.last().is_some_and(|&(_, d)| d > self.open.len()) {
            self.marks.pop();
        }
    }
}

/// Builds [`StreamingAssembler`]s sharing one bracket convention.
#[derive(Clone, Debug, Default)]
pub struct StreamingAssemblerFactory {
    brackets: Brackets,
}

impl StreamingAssemblerFactory {
    pub const NAME: &'static str = "streaming";

    pub fn new(brackets: Brackets) -> Self {
        Self { brackets }
    }

    /// Constructor registered under [`Self::NAME`]. Empty params select the
    /// default `{`, `}`, `,` convention.
    pub fn from_params(params: &[String]) -> Result<Arc<dyn AssemblerFactory>, AssemblerError> {
        let brackets = if params.is_empty() {
            Brackets::default()
        } else {
            Brackets::from_params(Self::NAME, params)?
        };
        Ok(Arc::new(Self::new(brackets)))
    }
}

impl AssemblerFactory for StreamingAssemblerFactory {
    fn create(&self) -> Box<dyn Assembler> {
        Box::new(StreamingAssembler::new(self.brackets.clone()))
    }
}

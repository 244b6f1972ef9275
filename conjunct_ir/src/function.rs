use internment::Intern;
use std::fmt::{Display, Formatter};

/// Identity of a function in the analyzed program.
///
/// Names are interned, so two ids built from the same name compare equal and
/// copying an id is free.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FunctionId(Intern<String>);

impl FunctionId {
    pub fn new<S: AsRef<str>>(name: S) -> Self {
        Self(Intern::from_ref(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for FunctionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl From<&str> for FunctionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A function or method definition. `parent_class` is set for methods,
/// `parent_function` for functions nested inside another function; plain
/// name strings stand in for the cyclic class/method relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRecord {
    pub name: String,
    pub file_path: String,
    pub body: String,
    pub start_line: usize,
    pub end_line: usize,
    pub parent_function: Option<String>,
    pub parent_class: Option<String>,
}

/// A class definition with its rendered field and method signature lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRecord {
    pub name: String,
    pub file_path: String,
    pub body: String,
    pub start_line: usize,
    pub end_line: usize,
    pub fields: Option<String>,
    pub methods: Option<String>,
}

/// One extracted definition, ready for insertion.
#[derive(Debug, Clone)]
pub enum Definition {
    Function(FunctionRecord),
    Class(ClassRecord),
}

tonic::include_proto!("tabgrid");
#[allow(dead_code)]
pub const FILE_DESCRIPTOR_SET: &[u8] =
    tonic::include_file_descriptor_set!("tabgrid_descriptor");

impl Line {
    /// Value of the column named by `column`, if present.
    pub fn value_of(&self, column: &str) -> Option<&str> {
        self.line.get(column).map(|v| v.as_str())
    }
}

impl From<&str> for TableRef {
    fn from(value: &str) -> Self {
        Self { name: value.into() }
    }
}

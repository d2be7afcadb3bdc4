#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    /// Column names from the file's header row, before mapping.
    pub headers: Vec<String>,
    /// Each data row, one String per field. Rows may be shorter or longer
    /// than `headers`.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Widest physical row, counting the header row.
    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }
}

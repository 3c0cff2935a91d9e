use crate::constant::{ColumnFlags, ColumnType};
use crate::value::FieldKind;

/// Column metadata captured from the statement's result metadata right
/// after a successful prepare. Immutable until the statement is
/// re-prepared.
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    pub name: String,
    pub column_type: ColumnType,
    pub flags: ColumnFlags,
    pub charsetnr: u32,
}

impl ColumnDescriptor {
    pub fn is_unsigned(&self) -> bool {
        self.flags.contains(ColumnFlags::UNSIGNED_FLAG)
    }

    /// General decoding category, including the binary-charset rule for
    /// blob-family columns.
    pub fn kind(&self) -> FieldKind {
        FieldKind::classify(self.column_type, self.charsetnr)
    }
}

/// Name plus classified kind, the caller-facing shape of one column.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub kind: FieldKind,
}

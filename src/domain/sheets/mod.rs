pub mod a1_notation;
pub mod cell_value;
pub mod column;
pub mod index_sheet;
pub mod row;
pub mod tabular_document;

pub mod expression_table;

pub use expression_table::{
    read_expression_table, write_annotations_table, ExpressionReaderConfig,
};

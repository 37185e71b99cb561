pub mod builder;
pub mod document;
pub mod retriever;
pub mod vector_index;

pub mod vocabulary;
pub mod extraction;
pub mod nlu;

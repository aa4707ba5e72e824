pub mod token_file;

pub use token_file::FileTokenStore;
pub use liveframe_common::traits::TokenStore;

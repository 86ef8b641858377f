//! Application services shared by the API and the CLI.

mod blog;

pub use blog::BlogService;

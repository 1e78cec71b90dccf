//! Input validation module.
//!
//! Provides validators for share names, source paths, client networks, user
//! lists and free-form directive values. Everything that ends up inside a
//! generated configuration file passes through one of these first.

mod directive;
mod network;
mod path;
mod share_name;
mod username;

pub use directive::{validate_directive_key, validate_directive_value, validate_nginx_value};
pub use network::validate_network;
pub use path::{check_share_directory, validate_share_path};
pub use share_name::validate_share_name;
pub use username::validate_share_user;

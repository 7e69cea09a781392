pub mod author_auth;

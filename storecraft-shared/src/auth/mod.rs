//! Authentication and authorization
//!
//! - [`password`]: Argon2id hashing for dashboard accounts
//! - [`jwt`]: HS256 access and refresh tokens
//! - [`middleware`]: axum middleware turning a token into an `AuthContext`
//! - [`authorization`]: role checks for store operations
//!
//! # Example
//!
//! ```
//! use storecraft_shared::auth::jwt::{create_token, validate_access_token, Claims, TokenType};
//! use storecraft_shared::auth::password::{hash_password, verify_password};
//! use storecraft_shared::models::membership::MembershipRole;
//! use uuid::Uuid;
//!
//! let hash = hash_password("Sunflower42").unwrap();
//! assert!(verify_password("Sunflower42", &hash).unwrap());
//!
//! let secret = "a-test-secret-that-is-long-enough-to-use";
//! let claims = Claims::new(Uuid::new_v4(), Uuid::new_v4(), MembershipRole::Owner, TokenType::Access);
//! let token = create_token(&claims, secret).unwrap();
//! assert!(validate_access_token(&token, secret).is_ok());
//! ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;

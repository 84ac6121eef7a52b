//! # AcmeKit - ACME v2 Client Protocol Engine
//!
//! A Rust library for obtaining X.509 certificates from ACME v2 servers
//! (RFC 8555). Supports Let's Encrypt, Google Trust Services, ZeroSSL,
//! SSL.com, Actalis, Pebble and custom ACME directories.
//!
//! ## Features
//!
//! - **Signed transport**: JWS envelopes, replay-nonce lifecycle with
//!   transparent bad-nonce recovery, problem-document decoding
//! - **Resource state machines**: accounts, orders, authorizations,
//!   challenges and certificates with lazy fetching and polling
//! - **Directory discovery**: conditional-GET caching of the directory
//!   and its metadata
//! - **Provider dispatch**: `acme://` shorthand URIs for well-known CAs
//! - **Challenge types**: http-01, dns-01, dns-account-01, tls-alpn-01
//!   and the S/MIME email-reply-00 extension
//! - **CSR builders**: DNS/IP signing requests and S/MIME email
//!   signing requests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use acmekit::prelude::*;
//! use std::time::Duration;
//!
//! fn main() -> acmekit::Result<()> {
//!     let session = Session::new("acme://letsencrypt.org/staging")?;
//!
//!     let account = AccountBuilder::new()
//!         .add_email("admin@example.com")?
//!         .agree_to_terms_of_service()
//!         .use_key_pair(KeyPair::generate_p256()?)
//!         .create(&session)?;
//!
//!     let mut order = account.new_order().domain("example.com")?.create()?;
//!     for mut authorization in order.authorizations()? {
//!         if let Some(mut challenge) = authorization.find_challenge(challenge::HTTP_01)? {
//!             // publish challenge.key_authorization()? under the
//!             // well-known path, then:
//!             challenge.trigger()?;
//!             challenge.wait_for_completion(Duration::from_secs(60))?;
//!         }
//!     }
//!
//!     order.wait_until_ready(Duration::from_secs(60))?;
//!     order.execute_with_key(&KeyPair::generate_p256()?)?;
//!     order.wait_for_completion(Duration::from_secs(60))?;
//!     let pem = order.certificate()?.chain_pem()?;
//!     println!("{pem}");
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod account;
pub mod authorization;
pub mod certificate;
pub mod challenge;
pub mod claims;
pub mod crypto;
pub mod csr;
pub mod directory;
pub mod error;
pub mod order;
pub mod problem;
pub mod provider;
pub(crate) mod resource;
pub mod session;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use account::{Account, AccountBuilder};
pub use authorization::Authorization;
pub use certificate::Certificate;
pub use challenge::{Challenge, ChallengeKind};
pub use claims::Claims;
pub use crypto::{Jwk, KeyPair, KeyType};
pub use csr::{CsrBuilder, KeyUsageType, SmimeCsrBuilder};
pub use directory::{Directory, DirectoryMeta, Resource};
pub use error::{AcmeError, Result, ServerError};
pub use order::{Order, OrderBuilder};
pub use problem::Problem;
pub use provider::AcmeProvider;
pub use session::{Login, Session, SessionBuilder};
pub use transport::{Connection, NetworkSettings};
pub use types::{Identifier, RevocationReason, Status};

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::{
        account::{Account, AccountBuilder},
        authorization::Authorization,
        certificate::Certificate,
        challenge::{self, Challenge, ChallengeKind},
        crypto::{Jwk, KeyPair, KeyType},
        csr::{CsrBuilder, KeyUsageType, SmimeCsrBuilder},
        directory::{Directory, DirectoryMeta, Resource},
        error::{AcmeError, Result, ServerError},
        order::{Order, OrderBuilder},
        problem::Problem,
        session::{Login, Session, SessionBuilder},
        transport::NetworkSettings,
        types::{Identifier, RevocationReason, Status},
    };
}

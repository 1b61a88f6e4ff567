//! Review ingestion and reply orchestration engine for bridging Google Play
//! app reviews into Matrix rooms.
//!
//! The crate has two layers:
//!
//! - [`PlayClient`](crate::client::PlayClient), a client for the Android
//!   Publisher reviews APIs: OAuth2 authentication, structured error
//!   classification, transient-failure retries for idempotent calls and a
//!   client-side floor on the call rate.
//! - [`Supervisor`](crate::bridge::Supervisor), the engine around it: one
//!   periodic poller per registered application that classifies reviews as
//!   new, updated or unchanged against a durable
//!   [`ReviewStore`](crate::store::ReviewStore), plus a retrying in-memory
//!   queue of outbound developer replies.
//!
//! The Matrix side of the bridge is not part of this crate; it is injected
//! through the [`MatrixSink`](crate::bridge::MatrixSink) trait and fed
//! through [`Supervisor::queue_reply`](crate::bridge::Supervisor::queue_reply).
//!
//! # Usage
//!
//! ## Initialize a new `PlayClient`
//!
//! Create a new [`PlayClient`](crate::client::PlayClient) and provide OAuth2
//! credentials authorized for the
//! `https://www.googleapis.com/auth/androidpublisher` scope.
//!
//! ```rust,no_run
//! # use playbridge::{PlayClient, apis::auth::*};
//! let play = PlayClient::new(Credentials::RefreshToken {
//!     client_id: "some-client-id".into(),
//!     client_secret: "some-client-secret".to_string().into(),
//!     refresh_token: "some-refresh-token".to_string().into(),
//! });
//! ```
//!
//! ## List and answer reviews directly
//!
//! ```rust,no_run
//! # use playbridge::{PlayClient, Error};
//! #
//! # #[tokio::main]
//! # async fn main() -> Result<(), Error> {
//! # let play: PlayClient = unreachable!();
//! #
//! let page = play.reviews.list("com.example.app", 50, None, None).await?;
//! for review in &page.reviews {
//!     tracing::info!(
//!         "{} left {} stars: {}",
//!         review.author_name,
//!         review.star_rating,
//!         review.text.as_deref().unwrap_or("<no text>")
//!     );
//! }
//!
//! play.reviews
//!     .reply("com.example.app", "review-id", "Thanks for the feedback!")
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Run the bridge engine
//!
//! ```rust,no_run
//! # use playbridge::{PlayClient, Error, Supervisor};
//! # use playbridge::bridge::{ApplicationRegistration, MatrixSink};
//! # use playbridge::store::SqliteReviewStore;
//! # use std::{sync::Arc, time::Duration};
//! #
//! # #[tokio::main]
//! # async fn main() -> Result<(), Error> {
//! # let play: PlayClient = unreachable!();
//! # let sink: Arc<dyn MatrixSink> = unreachable!();
//! #
//! let store = Arc::new(SqliteReviewStore::connect("sqlite://reviews.db").await?);
//! let supervisor = Supervisor::builder(play, store, sink).build();
//!
//! // Poll com.example.app every five minutes into !reviews:example.org
//! supervisor
//!     .register(
//!         ApplicationRegistration::builder("com.example.app", "!reviews:example.org")
//!             .with_poll_interval(Duration::from_secs(300))
//!             .build(),
//!     )
//!     .await?;
//!
//! // A reply authored by an operator in the bridged room
//! supervisor.queue_reply(
//!     "com.example.app",
//!     "review-id",
//!     "Thanks for the feedback!",
//!     "$event:example.org",
//!     "!reviews:example.org",
//!     "@operator:example.org",
//! )?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_debug_implementations)]
#![forbid(unsafe_code)]

pub mod apis;
pub(crate) mod authenticator;
pub mod bridge;
pub mod client;
mod common;
pub mod error;
mod middlewares;
pub mod store;

pub use bridge::Supervisor;
pub use client::PlayClient;
pub use error::Error;

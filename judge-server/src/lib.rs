//! HTTP surface of the gesture judge service.
//!
//! Clients start a session with `POST /session`, poll it with the same call
//! (or `GET /session/{id}`), and displays follow the most recent session with
//! `GET /result`. Evaluation runs in the background on the orchestrator owned
//! by [`AppState`].

pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;
pub use routes::create_router;

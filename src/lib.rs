// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # sgpc
//!
//! Scene-graph probabilistic completion: turns a text prompt or a scene graph
//! into evidence over a fixed feature vocabulary and asks a frozen
//! sum-product network which objects, attributes and relationships are likely
//! to complete the scene.
//!
//! ## Architecture
//!
//! - **Lexicon** (`lexicon`): object categories, attributes and relationships
//! - **Parsing** (`parser`, `normalize`): prompt → raw parse → [`scene::SceneGraph`]
//! - **Evidence** (`vocab`, `evidence`): scene graph → feature tokens → evidence vector
//! - **Oracle** (`oracle`): batched likelihoods from an SPN artifact
//! - **Queries** (`query`, `analysis`): single-feature perturbations ranked by
//!   conditional probability
//! - **Facade** (`service`): the loaded artifacts behind the `sgpc` CLI and the
//!   `sgpcd` server
//!
//! ## Library usage
//!
//! ```no_run
//! use sgpc::config::ServiceConfig;
//! use sgpc::service::Service;
//!
//! let service = Service::from_config(&ServiceConfig::default()).unwrap();
//! let scene = service.parse_prompt("a man riding a brown horse").unwrap();
//! let analysis = service.analyze(&scene).unwrap();
//! println!("{:?}", analysis.co_occur_probs);
//! ```

pub mod analysis;
pub mod config;
pub mod diffusion;
pub mod error;
pub mod evidence;
pub mod lexicon;
pub mod normalize;
pub mod oracle;
pub mod parser;
pub mod query;
pub mod scene;
pub mod service;
pub mod vocab;

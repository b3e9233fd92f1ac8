//! Pipeline stages for chatting with PDF documents.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and an external service can be swapped out without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! processing:  input ──▶ extract ──▶ clean ──▶ chunk ──▶ embed ──▶ index
//!              (path/URL) (lopdf)    (rules)   (windows) (HTTP)    (disk)
//!
//! questions:   embed ──▶ index search ──▶ prompt ──▶ llm
//! ```
//!
//! 1. [`input`]   — read a local file or download a URL into memory
//! 2. [`extract`] — pull the text layer of every page; runs in `spawn_blocking`
//!    because PDF parsing is CPU-bound
//! 3. [`clean`]   — normalise page text before it joins the corpus
//! 4. [`chunk`]   — split the corpus into overlapping windows
//! 5. [`embed`]   — vectorise chunks and questions through the embedding API
//! 6. [`llm`]     — send the rendered prompt to the chat model

pub mod chunk;
pub mod clean;
pub mod embed;
pub mod extract;
pub mod input;
pub mod llm;

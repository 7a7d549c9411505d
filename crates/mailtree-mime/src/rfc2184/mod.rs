//! RFC 2184 / RFC 2231 header parameter decoding.
//!
//! Long or non-ASCII parameter values may be split over several
//! `name*N=` fragments, and may carry a `charset'language'` prefix when
//! the name ends in `*`:
//!
//! ```text
//! Content-Type: message/external-body; access-type=URL;
//!   URL*0="ftp://";
//!   URL*1="cs.utk.edu/pub/moore/bulk-mailer/bulk-mailer.tar"
//! ```
//!
//! [`ParameterItem`] decodes one `name[*idx][*]=value` line and
//! [`ContentParameterParser`] reassembles the lines of one header into
//! [`Parameters`].

mod item;
mod parameters;

pub use item::ParameterItem;
pub use parameters::{ContentParameterParser, Parameter, Parameters};

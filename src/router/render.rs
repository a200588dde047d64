//! Response body renderers.
//!
//! The source's `render` package (`render/json.go`, `render/html.go`, ...)
//! is a set of small structs each implementing a two-method `Render`
//! interface (`Render(w http.ResponseWriter) error`, `WriteContentType`).
//! Translated directly: a `Render` trait object written into the
//! [`super::context::ResponseBuffer`] rather than an `io.Writer`, since the
//! actual socket write happens later in `router::server`.

use super::context::ResponseBuffer;
use std::io;

pub trait Render {
    /// Serialize the payload into `buf.body`.
    fn write(&self, buf: &mut ResponseBuffer) -> io::Result<()>;

    /// Set `Content-Type` if the renderer has an opinion about one.
    fn set_content_type(&self, buf: &mut ResponseBuffer) {
        let _ = buf;
    }
}

pub struct Json(pub serde_json::Value);

impl Render for Json {
    fn write(&self, buf: &mut ResponseBuffer) -> io::Result<()> {
        buf.body = serde_json::to_vec(&self.0).map_err(io::Error::other)?;
        Ok(())
    }

    fn set_content_type(&self, buf: &mut ResponseBuffer) {
        buf.set_header("Content-Type", "application/json; charset=utf-8");
    }
}

pub struct Text(pub String);

impl Render for Text {
    fn write(&self, buf: &mut ResponseBuffer) -> io::Result<()> {
        buf.body = self.0.clone().into_bytes();
        Ok(())
    }

    fn set_content_type(&self, buf: &mut ResponseBuffer) {
        buf.set_header("Content-Type", "text/plain; charset=utf-8");
    }
}

pub struct Html(pub String);

impl Render for Html {
    fn write(&self, buf: &mut ResponseBuffer) -> io::Result<()> {
        buf.body = self.0.clone().into_bytes();
        Ok(())
    }

    fn set_content_type(&self, buf: &mut ResponseBuffer) {
        buf.set_header("Content-Type", "text/html; charset=utf-8");
    }
}

/// Pre-serialized XML, the source's `render.XML`. No XML serialization
/// crate lives anywhere in the retrieval pack, so this takes an
/// already-marshaled document rather than fabricating a dependency on one:
/// callers who need struct-to-XML serialization bring their own serializer
/// and hand the result here, the same division of labor `Data` has between
/// "produce bytes" and "know the content type".
pub struct Xml(pub String);

impl Render for Xml {
    fn write(&self, buf: &mut ResponseBuffer) -> io::Result<()> {
        buf.body = self.0.clone().into_bytes();
        Ok(())
    }

    fn set_content_type(&self, buf: &mut ResponseBuffer) {
        buf.set_header("Content-Type", "application/xml; charset=utf-8");
    }
}

/// Arbitrary bytes with a caller-chosen content type, the source's
/// `render.Data`.
pub struct Data {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Render for Data {
    fn write(&self, buf: &mut ResponseBuffer) -> io::Result<()> {
        buf.body = self.bytes.clone();
        Ok(())
    }

    fn set_content_type(&self, buf: &mut ResponseBuffer) {
        buf.set_header("Content-Type", &self.content_type);
    }
}

/// HTTP redirect, the source's `render.Redirect`, writing a `Location`
/// header and an empty body. `code` must be a 3xx; that's enforced by the
/// caller ([`super::context::Context`]'s helpers), not here.
pub struct Redirect {
    pub location: String,
}

impl Render for Redirect {
    fn write(&self, buf: &mut ResponseBuffer) -> io::Result<()> {
        buf.set_header("Location", &self.location);
        Ok(())
    }
}

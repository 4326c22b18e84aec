//! Record classification for Wavefront-style OBJ streams.
//!
//! Classification is purely by fixed leading-token prefix match. Anything
//! that is not a recognized directive is [`Directive::Other`] and is copied
//! verbatim to whichever partition is currently active, so comments and
//! metadata keep their locality in the output.

/// One classified input record.
///
/// The payload is the unparsed remainder after the directive token, except
/// for [`Directive::Other`] which carries the whole line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive<'a> {
    /// `v ` — vertex position declaration.
    Vertex(&'a str),
    /// `vn ` — vertex normal declaration.
    Normal(&'a str),
    /// `vt ` — texture coordinate declaration.
    Texcoord(&'a str),
    /// `f ` — face record.
    Face(&'a str),
    /// `g ` — group marker; payload is the group name.
    Group(&'a str),
    /// `usemtl ` — material-use marker; payload is the material token,
    /// which may be empty.
    UseMaterial(&'a str),
    /// Anything else, passed through unrouted and undiscarded.
    Other(&'a str),
}

/// Classify one raw text record by its leading token.
pub fn classify(line: &str) -> Directive<'_> {
    if let Some(rest) = line.strip_prefix("v ") {
        Directive::Vertex(rest)
    } else if let Some(rest) = line.strip_prefix("vn ") {
        Directive::Normal(rest)
    } else if let Some(rest) = line.strip_prefix("vt ") {
        Directive::Texcoord(rest)
    } else if let Some(rest) = line.strip_prefix("f ") {
        Directive::Face(rest)
    } else if let Some(rest) = line.strip_prefix("g ") {
        let name = rest.trim();
        // OBJ's unnamed group marker means the default group.
        Directive::Group(if name.is_empty() { "default" } else { name })
    } else if line.trim_end() == "g" {
        Directive::Group("default")
    } else if let Some(rest) = line.strip_prefix("usemtl ") {
        Directive::UseMaterial(rest.trim())
    } else if line.trim_end() == "usemtl" {
        // A bare `usemtl` with no token is a known exporter defect; the
        // material resolver handles the empty token.
        Directive::UseMaterial("")
    } else {
        Directive::Other(line)
    }
}

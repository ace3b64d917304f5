use crate::error::{BitError, BitResult};
use crate::obj::{ObjType, Oid};
use crate::serialize::Serialize;
use crate::signature::BitSignature;
use std::fmt::{self, Display, Formatter};
use std::io::prelude::*;

/// An annotated tag: `object <hex>\n type <kind>\n tag <name>\n tagger <who-when>\n`,
/// blank line, message.
#[derive(PartialEq, Clone, Debug)]
pub struct Tag {
    pub(crate) target: Oid,
    pub(crate) target_kind: ObjType,
    pub(crate) name: String,
    pub(crate) tagger: BitSignature,
    pub(crate) message: String,
}

impl Tag {
    pub fn target(&self) -> Oid {
        self.target
    }

    pub fn target_kind(&self) -> ObjType {
        self.target_kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tagger(&self) -> &BitSignature {
        &self.tagger
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn parse(reader: &mut impl BufRead) -> BitResult<Self> {
        let mut target = None;
        let mut target_kind = None;
        let mut name = None;
        let mut tagger = None;

        loop {
            let mut line = String::new();
            let read = reader.read_line(&mut line).map_err(|e| BitError::io("<tag object>", e))?;
            if read == 0 {
                break;
            }
            if line.ends_with('\n') {
                line.pop();
            }
            if line.is_empty() {
                break;
            }
            let (k, v) = line
                .split_once(' ')
                .ok_or_else(|| BitError::corrupt("tag header", format!("`{}` has no value", line)))?;
            match k {
                "object" => target = Some(v.parse()?),
                "type" => target_kind = Some(v.parse()?),
                "tag" => name = Some(v.to_owned()),
                "tagger" => tagger = Some(v.parse()?),
                _ => {}
            }
        }

        // raw rather than line-by-line so the message's trailing newline
        // (or lack of one) survives the round trip untouched
        let mut message_bytes = vec![];
        reader.read_to_end(&mut message_bytes).map_err(|e| BitError::io("<tag object>", e))?;
        let message = String::from_utf8(message_bytes)
            .map_err(|_| BitError::corrupt("tag", "message is not valid utf-8"))?;

        Ok(Self {
            target: target.ok_or_else(|| BitError::corrupt("tag", "missing `object` header"))?,
            target_kind: target_kind
                .ok_or_else(|| BitError::corrupt("tag", "missing `type` header"))?,
            name: name.ok_or_else(|| BitError::corrupt("tag", "missing `tag` header"))?,
            tagger: tagger.ok_or_else(|| BitError::corrupt("tag", "missing `tagger` header"))?,
            message,
        })
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut buf = vec![];
        self.serialize(&mut buf).unwrap();
        write!(f, "{}", std::str::from_utf8(&buf).unwrap())
    }
}

impl Serialize for Tag {
    fn serialize(&self, writer: &mut dyn Write) -> BitResult<()> {
        writeln!(writer, "object {}", self.target)?;
        writeln!(writer, "type {}", self.target_kind)?;
        writeln!(writer, "tag {}", self.name)?;
        writeln!(writer, "tagger {}", self.tagger)?;
        writeln!(writer)?;
        write!(writer, "{}", self.message)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANNOTATED_TAG: &[u8] = b"object e98b3d7be9979411127f93a1b9027c1eb5fe83b4
type commit
tag v1.0.0
tagger Jake Brukhman <brukhman@gmail.com> 1348333582 -0400

Release 1.0.0";

    #[test]
    fn parse_annotated_tag() -> BitResult<()> {
        let tag = Tag::parse(&mut ANNOTATED_TAG)?;
        assert_eq!(tag.target.to_hex(), "e98b3d7be9979411127f93a1b9027c1eb5fe83b4");
        assert_eq!(tag.target_kind, ObjType::Commit);
        assert_eq!(tag.name, "v1.0.0");
        assert_eq!(tag.tagger.name, "Jake Brukhman");
        assert_eq!(tag.message, "Release 1.0.0");
        Ok(())
    }

    #[test]
    fn parse_then_serialize_round_trips() -> BitResult<()> {
        let tag = Tag::parse(&mut ANNOTATED_TAG)?;
        let mut buf = vec![];
        tag.serialize(&mut buf)?;
        assert_eq!(ANNOTATED_TAG, buf.as_slice());
        Ok(())
    }

    const TRAILING_NEWLINE_TAG: &[u8] = b"object e98b3d7be9979411127f93a1b9027c1eb5fe83b4
type commit
tag v1.0.0
tagger Jake Brukhman <brukhman@gmail.com> 1348333582 -0400

Release 1.0.0

See the changelog for details.
";

    #[test]
    fn parse_preserves_a_trailing_newline_in_the_message() -> BitResult<()> {
        let tag = Tag::parse(&mut TRAILING_NEWLINE_TAG)?;
        assert_eq!(tag.message, "Release 1.0.0\n\nSee the changelog for details.\n");

        let mut buf = vec![];
        tag.serialize(&mut buf)?;
        assert_eq!(buf.as_slice(), TRAILING_NEWLINE_TAG);
        Ok(())
    }

    #[test]
    fn rejects_missing_tagger_header() {
        let bytes: &[u8] = b"object e98b3d7be9979411127f93a1b9027c1eb5fe83b4\ntype commit\ntag v1.0.0\n\nmsg";
        let mut cursor = bytes;
        let err = Tag::parse(&mut cursor).unwrap_err();
        assert!(matches!(err.downcast_ref::<BitError>(), Some(BitError::Corrupt { .. })));
    }
}

use crate::error::{BitError, BitResult};
use crate::obj::Oid;
use crate::serialize::Serialize;
use crate::signature::BitSignature;
use std::fmt::{self, Display, Formatter};
use std::io::prelude::*;

#[derive(PartialEq, Clone, Debug)]
pub struct Commit {
    pub(crate) tree: Oid,
    pub(crate) author: BitSignature,
    pub(crate) committer: BitSignature,
    pub(crate) message: String,
    pub(crate) parents: Vec<Oid>,
    pub(crate) gpgsig: Option<String>,
}

impl Commit {
    pub fn tree(&self) -> Oid {
        self.tree
    }

    pub fn parents(&self) -> &[Oid] {
        &self.parents
    }

    pub fn author(&self) -> &BitSignature {
        &self.author
    }

    pub fn committer(&self) -> &BitSignature {
        &self.committer
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Commit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut buf = vec![];
        self.serialize(&mut buf).unwrap();
        write!(f, "{}", std::str::from_utf8(&buf).unwrap())
    }
}

impl Serialize for Commit {
    fn serialize(&self, writer: &mut dyn Write) -> BitResult<()> {
        // adds the required leading space for multiline header values
        macro_rules! w {
            ($s:expr) => {
                writeln!(writer, "{}", $s.replace('\n', "\n "))
            };
        }

        w!(format!("tree {}", self.tree))?;
        for parent in &self.parents {
            w!(format!("parent {}", parent))?;
        }
        w!(format!("author {}", self.author))?;
        w!(format!("committer {}", self.committer))?;
        if let Some(gpgsig) = &self.gpgsig {
            w!(format!("gpgsig {}", gpgsig))?;
        }

        writeln!(writer)?;
        write!(writer, "{}", self.message)?;
        Ok(())
    }
}

impl Commit {
    pub(crate) fn parse(reader: &mut impl BufRead) -> BitResult<Self> {
        let mut tree = None;
        let mut parents = vec![];
        let mut author = None;
        let mut committer = None;
        let mut gpgsig: Option<String> = None;

        let mut key: Option<String> = None;
        let mut value: Option<String> = None;

        macro_rules! flush {
            () => {
                if let (Some(k), Some(v)) = (key.take(), value.take()) {
                    match k.as_str() {
                        "tree" => tree = Some(v.parse()?),
                        "parent" => parents.push(v.parse()?),
                        "author" => author = Some(v.parse()?),
                        "committer" => committer = Some(v.parse()?),
                        "gpgsig" => gpgsig = Some(v),
                        _ => {}
                    }
                }
            };
        }

        loop {
            let mut line = String::new();
            let read = reader.read_line(&mut line).map_err(|e| BitError::io("<commit object>", e))?;
            if read == 0 {
                break;
            }
            if line.ends_with('\n') {
                line.pop();
            }

            if let Some(v) = &mut value {
                if let Some(cont) = line.strip_prefix(' ') {
                    v.push('\n');
                    v.push_str(cont);
                    continue;
                } else {
                    flush!();
                }
            }

            if line.is_empty() {
                break;
            }

            let (k, v) = line
                .split_once(' ')
                .ok_or_else(|| BitError::corrupt("commit header", format!("`{}` has no value", line)))?;
            key = Some(k.to_owned());
            value = Some(v.to_owned());
        }
        flush!();

        // read raw rather than line-by-line so the message's trailing
        // newline (or lack of one) survives the round trip untouched
        let mut message_bytes = vec![];
        reader.read_to_end(&mut message_bytes).map_err(|e| BitError::io("<commit object>", e))?;
        let message = String::from_utf8(message_bytes)
            .map_err(|_| BitError::corrupt("commit", "message is not valid utf-8"))?;

        Ok(Self {
            tree: tree.ok_or_else(|| BitError::corrupt("commit", "missing `tree` header"))?,
            author: author.ok_or_else(|| BitError::corrupt("commit", "missing `author` header"))?,
            committer: committer
                .ok_or_else(|| BitError::corrupt("commit", "missing `committer` header"))?,
            parents,
            message,
            gpgsig,
        })
    }
}

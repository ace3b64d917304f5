use crate::error::{BitError, BitGenericError, BitResult};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

#[derive(PartialEq, Clone, Debug, Hash, Ord, PartialOrd, Eq, Copy)]
pub struct BitEpochTime(i64);

impl BitEpochTime {
    pub fn new(i: i64) -> Self {
        Self(i)
    }

    pub fn as_secs(self) -> i64 {
        self.0
    }
}

#[derive(PartialEq, Clone, Debug, Hash, Ord, PartialOrd, Eq, Copy)]
/// timezone offset in minutes
pub struct BitTimeZoneOffset(i32);

impl BitTimeZoneOffset {
    pub fn new(offset: i32) -> Self {
        Self(offset)
    }
}

#[derive(PartialEq, Clone, Debug, PartialOrd, Eq, Ord, Hash)]
pub struct BitTime {
    pub(crate) time: BitEpochTime,
    pub(crate) offset: BitTimeZoneOffset,
}

#[derive(PartialEq, Clone, Debug)]
pub struct BitSignature {
    pub name: String,
    pub email: String,
    pub time: BitTime,
}

impl FromStr for BitTimeZoneOffset {
    type Err = BitGenericError;

    // format: (+|-)0200
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 5 {
            return Err(BitError::corrupt("signature timezone", format!("`{}` is not 5 characters", s)).into());
        }
        let sign = match &s[0..1] {
            "+" => 1,
            "-" => -1,
            _ =>
                return Err(BitError::corrupt("signature timezone", format!("`{}` has no sign", s)).into()),
        };
        let hours: i32 = s[1..3]
            .parse()
            .map_err(|_| BitError::corrupt("signature timezone", format!("`{}` is not numeric", s)))?;
        let minutes: i32 = s[3..5]
            .parse()
            .map_err(|_| BitError::corrupt("signature timezone", format!("`{}` is not numeric", s)))?;
        let offset = sign * (minutes + hours * 60);
        Ok(Self(offset))
    }
}

impl FromStr for BitEpochTime {
    type Err = BitGenericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(
            s.parse()
                .map_err(|_| BitError::corrupt("signature timestamp", format!("`{}` is not an integer", s)))?,
        ))
    }
}

impl FromStr for BitTime {
    type Err = BitGenericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut splits = s.split_ascii_whitespace();
        let time = splits
            .next()
            .ok_or_else(|| BitError::corrupt("signature time", "missing timestamp"))?
            .parse()?;
        let offset = splits
            .next()
            .ok_or_else(|| BitError::corrupt("signature time", "missing timezone offset"))?
            .parse()?;
        Ok(Self { time, offset })
    }
}

impl FromStr for BitSignature {
    type Err = BitGenericError;

    // Jake Brukhman <brukhman@gmail.com> 1348333582 -0400
    fn from_str(s: &str) -> BitResult<Self> {
        let email_start_idx = s
            .find('<')
            .ok_or_else(|| BitError::corrupt("signature", format!("`{}` has no `<`", s)))?;
        let email_end_idx = s
            .find('>')
            .ok_or_else(|| BitError::corrupt("signature", format!("`{}` has no `>`", s)))?;
        if email_start_idx == 0 || email_end_idx < email_start_idx {
            return Err(BitError::corrupt("signature", format!("`{}` is malformed", s)).into());
        }

        let name = s[..email_start_idx - 1].to_owned();
        let email = s[email_start_idx + 1..email_end_idx].to_owned();
        let time = s[email_end_idx + 1..].trim_start().parse()?;
        Ok(Self { name, email, time })
    }
}

impl Display for BitEpochTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for BitTimeZoneOffset {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let sign = if self.0 >= 0 { '+' } else { '-' };
        let offset = self.0.abs();
        let hours = offset / 60;
        let minutes = offset % 60;
        write!(f, "{}{:02}{:02}", sign, hours, minutes)?;
        Ok(())
    }
}

impl Display for BitTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.time, self.offset)
    }
}

impl Display for BitSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}> {}", self.name, self.email, self.time)
    }
}

#[cfg(test)]
mod tests;

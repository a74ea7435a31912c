use std::io::{self, Read, Write};

use crate::codec;
use crate::error::DecodeError;

/// Wire code of the shortest-route range query.
const RANGE_CODE: u8 = 1;

/// Identity of a location-based query: the owning agent plus a query id
/// unique within that agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QueryKey {
    /// Agent (user) id, unique in the whole simulation.
    pub uid: u32,
    /// Query id, unique for the agent only.
    pub qid: u32,
}

impl QueryKey {
    /// Creates a new key.
    pub const fn new(uid: u32, qid: u32) -> Self {
        Self { uid, qid }
    }

    /// Writes the key in its wire encoding.
    pub fn save_to(&self, out: &mut dyn Write) -> io::Result<()> {
        codec::write_u32(out, self.uid)?;
        codec::write_u32(out, self.qid)
    }

    /// Reads one wire-encoded key.
    pub fn load(input: &mut dyn Read) -> Result<Self, DecodeError> {
        let uid = codec::read_u32(input)?;
        let qid = codec::read_u32(input)?;
        Ok(Self { uid, qid })
    }
}

/// A location-based query an agent keeps active against the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocationQuery {
    /// All agents within a shortest-route radius of the issuer.
    /// The radius is in mm, or ms where range is measured in travel time.
    Range { radius: i32 },
}

impl LocationQuery {
    /// The query's one-byte wire code.
    pub fn type_code(&self) -> u8 {
        match self {
            LocationQuery::Range { .. } => RANGE_CODE,
        }
    }

    /// Writes the query in its wire encoding: the type code then the payload.
    pub fn save_to(&self, out: &mut dyn Write) -> io::Result<()> {
        codec::write_u8(out, self.type_code())?;
        match self {
            LocationQuery::Range { radius } => codec::write_i32(out, *radius),
        }
    }

    /// Reads one wire-encoded query, dispatching on the type code.
    pub fn load(input: &mut dyn Read) -> Result<Self, DecodeError> {
        match codec::read_u8(input)? {
            RANGE_CODE => Ok(LocationQuery::Range {
                radius: codec::read_i32(input)?,
            }),
            code => Err(DecodeError::UnknownQueryType(code)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn query_wire_round_trip() {
        let query = LocationQuery::Range { radius: 250_000 };
        let mut buf = Vec::new();
        QueryKey::new(17, 3).save_to(&mut buf).unwrap();
        query.save_to(&mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(QueryKey::load(&mut cursor).unwrap(), QueryKey::new(17, 3));
        assert_eq!(LocationQuery::load(&mut cursor).unwrap(), query);
    }

    #[test]
    fn unknown_query_code_is_rejected() {
        let mut cursor = Cursor::new(vec![9u8, 0, 0, 0, 0]);
        assert!(matches!(
            LocationQuery::load(&mut cursor),
            Err(DecodeError::UnknownQueryType(9))
        ));
    }
}

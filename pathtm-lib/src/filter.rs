//! Acceptance predicates for the streaming decoder.

use crate::packet::{Apid, CcsdsHeader, EsaHeader};
use crate::Result;

/// Decides whether a decoded record is surfaced or silently skipped.
///
/// The secondary header is `None` for packets that do not declare one.
pub trait Filter {
    fn keep(&self, ccsds: &CcsdsHeader, esa: Option<&EsaHeader>) -> Result<bool>;
}

impl<F> Filter for F
where
    F: Fn(&CcsdsHeader, Option<&EsaHeader>) -> Result<bool>,
{
    fn keep(&self, ccsds: &CcsdsHeader, esa: Option<&EsaHeader>) -> Result<bool> {
        self(ccsds, esa)
    }
}

/// Accepts every packet.
#[derive(Debug, Default, Clone, Copy)]
pub struct All;

impl Filter for All {
    fn keep(&self, _: &CcsdsHeader, _: Option<&EsaHeader>) -> Result<bool> {
        Ok(true)
    }
}

/// Accepts packets of one APID; `None` accepts all.
#[derive(Debug, Clone, Copy)]
pub struct WithApid(pub Option<Apid>);

impl Filter for WithApid {
    fn keep(&self, ccsds: &CcsdsHeader, _: Option<&EsaHeader>) -> Result<bool> {
        Ok(self.0.is_none() || self.0 == Some(ccsds.apid()))
    }
}

/// Accepts packets of one source id; `None` accepts all. Packets without a
/// secondary header carry no source id and never match a set filter.
#[derive(Debug, Clone, Copy)]
pub struct WithSid(pub Option<u32>);

impl Filter for WithSid {
    fn keep(&self, _: &CcsdsHeader, esa: Option<&EsaHeader>) -> Result<bool> {
        match self.0 {
            None => Ok(true),
            Some(sid) => Ok(esa.map(|e| e.sid) == Some(sid)),
        }
    }
}

/// Accepts when both inner filters accept.
#[derive(Debug, Clone, Copy)]
pub struct And<A, B>(pub A, pub B);

impl<A: Filter, B: Filter> Filter for And<A, B> {
    fn keep(&self, ccsds: &CcsdsHeader, esa: Option<&EsaHeader>) -> Result<bool> {
        Ok(self.0.keep(ccsds, esa)? && self.1.keep(ccsds, esa)?)
    }
}

/// Accepts when either inner filter accepts.
#[derive(Debug, Clone, Copy)]
pub struct Or<A, B>(pub A, pub B);

impl<A: Filter, B: Filter> Filter for Or<A, B> {
    fn keep(&self, ccsds: &CcsdsHeader, esa: Option<&EsaHeader>) -> Result<bool> {
        Ok(self.0.keep(ccsds, esa)? || self.1.keep(ccsds, esa)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(apid: Apid, sid: u32) -> (CcsdsHeader, EsaHeader) {
        (
            CcsdsHeader {
                pid: 0x0800 | apid,
                fragment: 0,
                length: 0,
            },
            EsaHeader {
                sid,
                ..EsaHeader::default()
            },
        )
    }

    #[test]
    fn wildcards() {
        let (ccsds, esa) = headers(42, 7);
        assert!(All.keep(&ccsds, Some(&esa)).unwrap());
        assert!(WithApid(None).keep(&ccsds, Some(&esa)).unwrap());
        assert!(WithSid(None).keep(&ccsds, None).unwrap());
    }

    #[test]
    fn by_apid() {
        let (ccsds, esa) = headers(42, 7);
        assert!(WithApid(Some(42)).keep(&ccsds, Some(&esa)).unwrap());
        assert!(!WithApid(Some(43)).keep(&ccsds, Some(&esa)).unwrap());
    }

    #[test]
    fn by_sid() {
        let (ccsds, esa) = headers(42, 7);
        assert!(WithSid(Some(7)).keep(&ccsds, Some(&esa)).unwrap());
        assert!(!WithSid(Some(8)).keep(&ccsds, Some(&esa)).unwrap());
        // no secondary header, no source id
        assert!(!WithSid(Some(7)).keep(&ccsds, None).unwrap());
    }

    #[test]
    fn combinators() {
        let (ccsds, esa) = headers(42, 7);
        let both = And(WithApid(Some(42)), WithSid(Some(7)));
        assert!(both.keep(&ccsds, Some(&esa)).unwrap());
        let either = Or(WithApid(Some(1)), WithSid(Some(7)));
        assert!(either.keep(&ccsds, Some(&esa)).unwrap());
        let neither = And(WithApid(Some(1)), WithSid(Some(7)));
        assert!(!neither.keep(&ccsds, Some(&esa)).unwrap());
    }
}

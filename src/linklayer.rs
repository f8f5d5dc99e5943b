//! The default link-layer shim (spec.md §6: "Link-layer shim").
//!
//! A packet whose ethertype matches `scheme_ethertype` carries an 18-byte
//! prefix ahead of a standard Ethernet frame; this strips it so downstream
//! decoding can treat the remainder uniformly. Grounded on the `garland`
//! plugin's `arkime_packet_garland` callback (`original_source/capture/plugins/garland.c`):
//! registered against a configurable ethertype (`garlandEthertype`, default
//! `0xff12`) at the Ethernet dispatch layer, it rejects anything under 20
//! bytes as corrupt and otherwise forwards `data + 18, len - 18` to the
//! inner Ethernet frame's own dispatch.

/// Offset, within a standard Ethernet header, of the EtherType field this
/// shim inspects to decide whether a frame is one of its own.
const ETHERTYPE_OFFSET: usize = 12;
/// Width, in bytes, of the prefix stripped once the ethertype matches.
const SHIM_PREFIX_LEN: usize = 18;
/// Minimum total length accepted once the ethertype matches (garland.c:
/// `if (len < 20) return ARKIME_PACKET_CORRUPT;`) — two bytes of inner frame
/// left over after the 18-byte prefix, not merely "prefix fits".
const MIN_SHIMMED_LEN: usize = 20;

/// Strip the scheme prefix from `body` if its ethertype matches
/// `scheme_ethertype`, returning the remaining Ethernet frame.
///
/// Returns `None` if the ethertype matches but fewer than
/// [`MIN_SHIMMED_LEN`] bytes are present — "shorter payloads are reported as
/// corrupt" (spec.md §6).
pub fn strip_scheme_prefix(body: &[u8], scheme_ethertype: u16) -> Option<&[u8]> {
    if body.len() < ETHERTYPE_OFFSET + 2 {
        return Some(body);
    }
    let ethertype = u16::from_be_bytes([body[ETHERTYPE_OFFSET], body[ETHERTYPE_OFFSET + 1]]);
    if ethertype != scheme_ethertype {
        return Some(body);
    }
    if body.len() < MIN_SHIMMED_LEN {
        return None;
    }
    Some(&body[SHIM_PREFIX_LEN..])
}

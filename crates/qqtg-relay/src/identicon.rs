use sha2::{Digest, Sha256};

const WHITE: char = '⬜';
const BLOCKS: [char; 8] = ['🟥', '🟧', '🟨', '🟩', '🟦', '🟪', '🟫', '⬛'];

/// Four-cell colour-block badge derived from a sender id.
///
/// The same id always yields the same badge, which lets readers tell apart
/// group members sharing a display name.
pub fn identicon(sender_id: i64) -> String {
    let digest = Sha256::digest(sender_id.to_string().as_bytes());
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&digest[digest.len() - 8..]);
    let n = u64::from_be_bytes(tail);

    let block = BLOCKS[((n >> 5) % BLOCKS.len() as u64) as usize];
    (0..4)
        .map(|bit| if n >> bit & 1 == 1 { block } else { WHITE })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_and_four_cells() {
        let a = identicon(10001);
        assert_eq!(a, identicon(10001));
        assert_eq!(a.chars().count(), 4);
        assert!(a
            .chars()
            .all(|c| c == WHITE || BLOCKS.contains(&c)));
    }

    #[test]
    fn uses_a_single_colour() {
        for id in [1_i64, 42, 555, 123_456_789] {
            let colours: std::collections::HashSet<char> =
                identicon(id).chars().filter(|c| *c != WHITE).collect();
            assert!(colours.len() <= 1, "{id}: {colours:?}");
        }
    }

    #[test]
    fn ids_spread_across_badges() {
        let distinct: std::collections::HashSet<String> = (1..200).map(identicon).collect();
        assert!(distinct.len() > 10);
    }
}

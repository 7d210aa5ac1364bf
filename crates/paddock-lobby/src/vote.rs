//! Plurality map vote.

use std::collections::HashMap;

use paddock_protocol::TallyView;

use crate::ParticipantRecord;

/// Winner of the map vote, derived from participant records on demand.
///
/// Never stored as independent state: the directory recomputes it after
/// every vote and every departure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoteTally {
    pub map_index: usize,
    pub votes: usize,
}

impl VoteTally {
    /// Tallies the records' votes, scanning in registration order.
    pub fn recompute<'a>(records: impl IntoIterator<Item = &'a ParticipantRecord>) -> Self {
        Self::from_votes(records.into_iter().map(|r| r.map_vote))
    }

    /// Tallies raw map indices.
    ///
    /// On a tie the map that reached the winning count first wins; the
    /// leader only changes on a strictly greater count. No votes yields
    /// map 0 with 0 votes.
    pub fn from_votes(votes: impl IntoIterator<Item = usize>) -> Self {
        let mut counts: HashMap<usize, usize> = HashMap::new();
        let mut leader = Self::default();
        for map_index in votes {
            let count = counts.entry(map_index).or_insert(0);
            *count += 1;
            if *count > leader.votes {
                leader = Self {
                    map_index,
                    votes: *count,
                };
            }
        }
        leader
    }

    pub fn view(&self) -> TallyView {
        TallyView {
            map_index: self.map_index,
            votes: self.votes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tally() {
        assert_eq!(VoteTally::from_votes(std::iter::empty()), VoteTally::default());
    }

    #[test]
    fn test_plurality_winner() {
        let tally = VoteTally::from_votes([0, 1, 0]);
        assert_eq!(tally, VoteTally { map_index: 0, votes: 2 });
    }

    #[test]
    fn test_tie_goes_to_first_map_to_reach_the_max() {
        // A, B, A, B: map 2 reaches two votes first.
        let tally = VoteTally::from_votes([2, 1, 2, 1]);
        assert_eq!(tally, VoteTally { map_index: 2, votes: 2 });

        // B, A, A, B: map 0 reaches two votes before map 1 does,
        // even though map 1 was voted for first.
        let tally = VoteTally::from_votes([1, 0, 0, 1]);
        assert_eq!(tally, VoteTally { map_index: 0, votes: 2 });
    }

    #[test]
    fn test_tie_is_not_broken_by_lowest_index() {
        let tally = VoteTally::from_votes([3, 0]);
        assert_eq!(tally.map_index, 3);
    }
}

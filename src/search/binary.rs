use super::Lookup;

/// First-byte bounds over the sorted first-record array: the entries whose
/// records start with byte `b` occupy `lower[b]..upper[b]`. Bytes with no
/// entries get an empty range at their insertion position, so a bucketed
/// search still lands next to the right neighbours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buckets {
    lower: Vec<usize>,
    upper: Vec<usize>,
}

impl Buckets {
    pub fn new(firsts: &[Vec<u8>]) -> Self {
        let mut count = [0usize; 256];
        for first in firsts {
            count[first[0] as usize] += 1;
        }
        let mut lower = vec![0usize; 256];
        let mut upper = vec![0usize; 256];
        let mut total = 0;
        for b in 0..256 {
            lower[b] = total;
            total += count[b];
            upper[b] = total;
        }
        Self { lower, upper }
    }

    fn range(&self, b: u8) -> (usize, usize) {
        (self.lower[b as usize], self.upper[b as usize])
    }
}

/// Binary-search the index for the block that would hold `query`.
///
/// An exact hit (or a query that the very first record extends) settles the
/// lookup; otherwise the result is the greatest entry below the query. None
/// means the query sorts before the whole database.
pub fn locate(firsts: &[Vec<u8>], buckets: Option<&Buckets>, query: &[u8]) -> Option<Lookup> {
    if firsts.is_empty() {
        return None;
    }
    let (lo, hi) = match buckets {
        Some(buckets) => buckets.range(query[0]),
        None => (0, firsts.len()),
    };
    match firsts[lo..hi].binary_search_by(|first| first.as_slice().cmp(query)) {
        Ok(i) => Some(Lookup {
            pos: lo + i,
            exact: true,
        }),
        Err(i) if lo + i == 0 => {
            // The query sorts before every entry; it can still resolve when
            // the first entry extends it.
            if firsts[0].starts_with(query) {
                Some(Lookup {
                    pos: 0,
                    exact: true,
                })
            } else {
                None
            }
        }
        Err(i) => Some(Lookup {
            pos: lo + i - 1,
            exact: false,
        }),
    }
}

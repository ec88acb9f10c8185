use core::{cmp::Ordering, ops::Range};
use std::{
    string::{String, ToString},
    vec::Vec,
};

use ahash::RandomState;
use hashbrown::HashMap;
use ordered_float::OrderedFloat;

use crate::ColumnSource;

use super::Error;

/// Group key column in categorical form: each distinct label gets a compact code.
#[derive(Debug, Clone, Default)]
pub(crate) struct GroupKeys {
    /// Code per row, `None` for a missing key
    codes: Vec<Option<u32>>,
    /// Label per code
    labels: Vec<String>,
    /// Code per label
    lookup: HashMap<String, u32, RandomState>,
}

impl GroupKeys {
    pub(crate) fn push(&mut self, label: Option<&str>) {
        let code = label.map(|label| match self.lookup.get(label) {
            Some(&code) => code,
            None => {
                let code = self.labels.len() as u32;
                self.labels.push(label.to_string());
                self.lookup.insert(label.to_string(), code);
                code
            }
        });
        self.codes.push(code);
    }

    pub(crate) fn reserve(&mut self, additional: usize) {
        self.codes.reserve(additional);
    }

    pub(crate) fn len(&self) -> usize {
        self.codes.len()
    }

    pub(crate) fn num_groups(&self) -> usize {
        self.labels.len() + usize::from(self.codes.iter().any(Option::is_none))
    }

    /// Lexical rank of every code, so that sorting by rank sorts by label
    fn ranks(&self) -> Vec<u32> {
        let mut by_label: Vec<u32> = (0..self.labels.len() as u32).collect();
        by_label.sort_unstable_by(|&a, &b| self.labels[a as usize].cmp(&self.labels[b as usize]));

        let mut ranks = vec![0; self.labels.len()];
        for (rank, code) in by_label.into_iter().enumerate() {
            ranks[code as usize] = rank as u32;
        }
        ranks
    }
}

/// Time column normalized into a totally ordered key.
#[derive(Debug, Clone)]
pub(crate) enum TimeKeys {
    /// Integers, dates, timestamps and durations by their physical value
    Int(Vec<Option<i64>>),
    /// Floating point times, `NaN` ordered last
    Float(Vec<Option<OrderedFloat<f64>>>),
    /// Strings, compared lexically
    Text(Vec<Option<String>>),
}

impl TimeKeys {
    fn cmp_rows(&self, a: usize, b: usize) -> Ordering {
        match self {
            Self::Int(keys) => keys[a].cmp(&keys[b]),
            Self::Float(keys) => keys[a].cmp(&keys[b]),
            Self::Text(keys) => keys[a].cmp(&keys[b]),
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Int(keys) => keys.len(),
            Self::Float(keys) => keys.len(),
            Self::Text(keys) => keys.len(),
        }
    }
}

/// The projected, type-normalized dataset a run works on.
#[derive(Debug, Clone, Default)]
pub(crate) struct Frame {
    pub(crate) groups: GroupKeys,
    pub(crate) time: Option<TimeKeys>,
    pub(crate) values: HashMap<String, Vec<Option<f64>>, RandomState>,
}

impl Frame {
    pub(crate) fn num_rows(&self) -> usize {
        self.groups.len()
    }

    /// Row indices in (group label, time, stored position) order.
    ///
    /// Missing group keys and missing times sort first. The sort is stable, so rows that
    /// tie on group and time keep their stored order.
    pub(crate) fn sort_permutation(&self) -> Vec<usize> {
        let ranks = self.groups.ranks();
        let codes = &self.groups.codes;
        let rank = |row: usize| codes[row].map(|code| ranks[code as usize]);

        let mut perm: Vec<usize> = (0..self.num_rows()).collect();
        perm.sort_by(|&a, &b| {
            let by_group = rank(a).cmp(&rank(b));
            match &self.time {
                Some(time) => by_group.then_with(|| time.cmp_rows(a, b)),
                None => by_group,
            }
        });
        perm
    }

    /// Splits a sorted permutation into the contiguous ranges each group occupies
    pub(crate) fn group_runs(&self, perm: &[usize]) -> Vec<Range<usize>> {
        let codes = &self.groups.codes;
        let mut runs = Vec::with_capacity(self.groups.num_groups());
        let mut start = 0;
        for i in 1..=perm.len() {
            if i == perm.len() || codes[perm[i]] != codes[perm[start]] {
                runs.push(start..i);
                start = i;
            }
        }
        runs
    }
}

impl ColumnSource for Frame {
    type Error = Error;

    fn num_rows(&self) -> usize {
        Frame::num_rows(self)
    }

    fn column(&self, name: &str) -> Result<&[Option<f64>], Error> {
        self.values
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    }
}

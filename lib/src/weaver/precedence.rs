use std::cmp::Ordering;

/// Outcome of comparing the precedence of two candidates
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum PartialOrder {
    /// The first candidate has lower precedence
    Less,

    /// The first candidate has higher precedence
    Greater,

    /// Nothing constrains the relative order of the candidates
    Incomparable,

    /// Some constraints put the first candidate lower and others put it higher
    Conflicting,
}

impl PartialOrder {
    pub fn reverse(self) -> PartialOrder {
        match self {
            PartialOrder::Less => PartialOrder::Greater,
            PartialOrder::Greater => PartialOrder::Less,
            PartialOrder::Incomparable => PartialOrder::Incomparable,
            PartialOrder::Conflicting => PartialOrder::Conflicting,
        }
    }
}

/// Candidates whose precedence constraints form a cycle
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PrecedenceCycle {
    /// Indices of the candidates on the cycle, each one having lower precedence than the next
    /// (and the last lower than the first)
    pub members: Vec<usize>,
}

/// Order candidates by increasing precedence
///
/// `compare` is asked about every pair in both directions and each answer is honoured, so a
/// comparison that disagrees with its reverse (or answers `Conflicting`) shows up as a cycle
/// of two. `compare` is only trusted where it doesn't answer `Incomparable`. Every other choice is made
/// by `fallback`, which only serves to make the output deterministic: whenever several
/// candidates are free to go next, the least according to `fallback` is taken.
///
/// The result is a permutation of the indices of `items`, lowest precedence first.
pub fn sort_by_precedence<T>(
    items: &[T],
    mut compare: impl FnMut(&T, &T) -> PartialOrder,
    mut fallback: impl FnMut(&T, &T) -> Ordering,
) -> Result<Vec<usize>, PrecedenceCycle> {
    let n = items.len();

    // `lower[j]` lists the candidates which must come before `j`
    let mut lower: Vec<Vec<usize>> = vec![vec![]; n];
    for i in 0..n {
        for j in i + 1..n {
            let forward = compare(&items[i], &items[j]);
            let backward = compare(&items[j], &items[i]).reverse();
            let mut i_below_j = false;
            let mut j_below_i = false;
            for answer in [forward, backward] {
                match answer {
                    PartialOrder::Less => i_below_j = true,
                    PartialOrder::Greater => j_below_i = true,
                    PartialOrder::Conflicting => {
                        i_below_j = true;
                        j_below_i = true;
                    }
                    PartialOrder::Incomparable => (),
                }
            }
            if i_below_j {
                lower[j].push(i);
            }
            if j_below_i {
                lower[i].push(j);
            }
        }
    }

    let mut placed = vec![false; n];
    let mut in_degree: Vec<usize> = lower.iter().map(Vec::len).collect();
    let mut order = Vec::with_capacity(n);
    while order.len() < n {
        let mut next: Option<usize> = None;
        for candidate in (0..n).filter(|c| !placed[*c] && in_degree[*c] == 0) {
            next = match next {
                Some(best) if fallback(&items[best], &items[candidate]) != Ordering::Greater => {
                    Some(best)
                }
                _ => Some(candidate),
            };
        }

        let next = match next {
            Some(next) => next,
            None => return Err(find_cycle(&lower, &placed)),
        };
        placed[next] = true;
        order.push(next);
        for (j, lower_j) in lower.iter().enumerate() {
            if !placed[j] && lower_j.contains(&next) {
                in_degree[j] -= 1;
            }
        }
    }
    Ok(order)
}

/// Walk backwards along unplaced predecessors until a candidate repeats
///
/// Every unplaced candidate has an unplaced predecessor, so the walk must eventually loop.
fn find_cycle(lower: &[Vec<usize>], placed: &[bool]) -> PrecedenceCycle {
    let start = placed.iter().position(|p| !p).unwrap_or(0);
    let mut path: Vec<usize> = vec![];
    let mut current = start;
    loop {
        if let Some(seen_at) = path.iter().position(|c| *c == current) {
            let mut members = path.split_off(seen_at);
            members.reverse();
            return PrecedenceCycle { members };
        }
        path.push(current);
        match lower[current].iter().find(|pred| !placed[**pred]) {
            Some(pred) => current = *pred,
            None => return PrecedenceCycle { members: path },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn by_table(table: &'static [(char, char)]) -> impl FnMut(&char, &char) -> PartialOrder {
        move |a, b| {
            if table.contains(&(*a, *b)) {
                PartialOrder::Less
            } else if table.contains(&(*b, *a)) {
                PartialOrder::Greater
            } else {
                PartialOrder::Incomparable
            }
        }
    }

    #[test]
    fn respects_constraints_then_fallback() {
        let items = ['d', 'c', 'b', 'a'];
        let order =
            sort_by_precedence(&items, by_table(&[('c', 'a')]), |a, b| a.cmp(b)).unwrap();
        let sorted: String = order.iter().map(|i| items[*i]).collect();
        assert_eq!(sorted, "bcad");
    }

    #[test]
    fn reports_cycles() {
        let items = ['x', 'a', 'b', 'c'];
        let cycle = sort_by_precedence(
            &items,
            by_table(&[('a', 'b'), ('b', 'c'), ('c', 'a')]),
            |a, b| a.cmp(b),
        )
        .unwrap_err();

        let mut members: Vec<char> = cycle.members.iter().map(|i| items[*i]).collect();
        assert_eq!(members.len(), 3);

        // Each member has lower precedence than the next one
        for (idx, member) in members.iter().enumerate() {
            let next = members[(idx + 1) % members.len()];
            assert!(
                [('a', 'b'), ('b', 'c'), ('c', 'a')].contains(&(*member, next)),
                "{} -> {}",
                member,
                next
            );
        }
        members.sort_unstable();
        assert_eq!(members, vec!['a', 'b', 'c']);
    }

    #[test]
    fn one_sided_answers_are_honoured() {
        // Only ever answers when asked with the larger item first
        let items = ['a', 'b', 'c'];
        let order = sort_by_precedence(
            &items,
            |a, b| {
                if (*a, *b) == ('c', 'a') {
                    PartialOrder::Less
                } else {
                    PartialOrder::Incomparable
                }
            },
            |a, b| a.cmp(b),
        )
        .unwrap();
        let sorted: String = order.iter().map(|i| items[*i]).collect();
        assert_eq!(sorted, "bca");
    }

    #[test]
    fn disagreeing_directions_form_a_cycle() {
        // Each item claims to be lower than the other
        let items = ['a', 'b', 'z'];
        let cycle = sort_by_precedence(
            &items,
            |a, b| {
                if *a != 'z' && *b != 'z' {
                    PartialOrder::Less
                } else {
                    PartialOrder::Incomparable
                }
            },
            |a, b| a.cmp(b),
        )
        .unwrap_err();
        let mut members: Vec<char> = cycle.members.iter().map(|i| items[*i]).collect();
        members.sort_unstable();
        assert_eq!(members, vec!['a', 'b']);
    }

    #[test]
    fn conflicting_pairs_form_a_cycle() {
        let items = ['p', 'q'];
        let cycle = sort_by_precedence(&items, |_, _| PartialOrder::Conflicting, |a, b| a.cmp(b))
            .unwrap_err();
        assert_eq!(cycle.members.len(), 2);
    }

    #[test]
    fn empty_and_single() {
        let none: [u8; 0] = [];
        assert_eq!(
            sort_by_precedence(&none, |_, _| PartialOrder::Incomparable, Ord::cmp),
            Ok(vec![])
        );
        assert_eq!(
            sort_by_precedence(&[7], |_, _| PartialOrder::Incomparable, Ord::cmp),
            Ok(vec![0])
        );
    }
}

// cminify - a source-to-source minifier for C.
// Copyright (C) 2025 Eliot Hall
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <http://www.gnu.org/licenses/>.

//! The define-introduction pass.
//!
//! Finds repeated token runs and lifts the most valuable one into a
//! `#define` with a freshly minted name, repeating greedily while each round
//! strictly shrinks the serialized length.  The stream is interned into
//! integer codes; repeats are found with a suffix array (sorted cyclic
//! shifts with counting sort) and its LCP array, taking the full common
//! prefix of each suffix-array adjacency as the one candidate from that
//! adjacency.  Replacement is a KMP scan that never lets matches overlap.
//!
//! Preprocessor-line tokens and the entry point's name are protected: they
//! weigh nothing and never appear inside an extracted sequence.  A minted
//! name that collided with any identifier in the stream would be expanded by
//! the preprocessor at every occurrence, so every spelling in the stream is
//! reserved before minting.

use std::collections::{HashMap, HashSet};

use enum_map::{Enum, EnumMap};
use itertools::Itertools;
use log::debug;

use crate::{
    identifier::next_free_name,
    lex::{classify::scan_classified, Token},
    pass::{Pass, PassError},
    source::SourceFile,
};

#[derive(Clone, Debug)]
struct CodeInfo {
    spelling: String,
    is_pp: bool,
    is_punct: bool,
    protected: bool,
    weight: usize,
}

impl CodeInfo {
    fn from_token(token: &Token) -> Self {
        let protected = token.is_pp_line() || token.spelling == "main";
        Self {
            spelling: token.spelling.clone(),
            is_pp: token.is_pp_line(),
            is_punct: token.is_punct(),
            protected,
            weight: if protected { 0 } else { token.spelling.len() },
        }
    }
}

/// Interns tokens into integer codes; one code per distinct spelling.
fn encode(tokens: &[Token]) -> (Vec<i32>, Vec<CodeInfo>) {
    let mut by_spelling: HashMap<String, i32> = HashMap::new();
    let mut infos = Vec::new();
    let mut stream = Vec::with_capacity(tokens.len());
    for token in tokens {
        let code = *by_spelling.entry(token.spelling.clone()).or_insert_with(|| {
            infos.push(CodeInfo::from_token(token));
            (infos.len() - 1) as i32
        });
        stream.push(code);
    }
    (stream, infos)
}

/// Serialized length of a code stream: the sum of token weights plus one
/// separator byte between adjacent tokens that are both identifier-like.
fn serialized_len(stream: &[i32], infos: &[CodeInfo]) -> usize {
    let mut len = stream
        .first()
        .map(|&c| infos[c as usize].weight)
        .unwrap_or(0);
    for (&prev, &cur) in stream.iter().tuple_windows() {
        let (p, c) = (&infos[prev as usize], &infos[cur as usize]);
        if !p.is_pp && !c.is_pp && !p.is_punct && !c.is_punct {
            len += 1;
        }
        len += c.weight;
    }
    len
}

/// Sorts the cyclic shifts of `arr` in `O(n log n)` using equivalence
/// classes doubled each round, with a counting sort per round.
fn sort_cyclic_shifts(arr: &[i32]) -> Vec<usize> {
    let n = arr.len();
    if n == 0 {
        return Vec::new();
    }
    let mut p: Vec<usize> = (0..n).collect();
    p.sort_unstable_by_key(|&i| arr[i]);
    let mut c = vec![0usize; n];
    let mut classes = 1;
    for i in 1..n {
        if arr[p[i]] != arr[p[i - 1]] {
            classes += 1;
        }
        c[p[i]] = classes - 1;
    }

    let mut pn = vec![0usize; n];
    let mut cn = vec![0usize; n];
    let mut counts = vec![0usize; n];
    let mut shift = 1;
    while shift < n {
        for i in 0..n {
            pn[i] = (p[i] + n - shift) % n;
        }
        counts[..classes].fill(0);
        for i in 0..n {
            counts[c[pn[i]]] += 1;
        }
        for i in 1..classes {
            counts[i] += counts[i - 1];
        }
        for i in (0..n).rev() {
            counts[c[pn[i]]] -= 1;
            p[counts[c[pn[i]]]] = pn[i];
        }

        cn[p[0]] = 0;
        classes = 1;
        for i in 1..n {
            let cur = (c[p[i]], c[(p[i] + shift) % n]);
            let prev = (c[p[i - 1]], c[(p[i - 1] + shift) % n]);
            if cur != prev {
                classes += 1;
            }
            cn[p[i]] = classes - 1;
        }
        std::mem::swap(&mut c, &mut cn);
        shift *= 2;
    }
    p
}

/// Suffix array via cyclic shifts of the stream with a sentinel smaller than
/// every code appended.
fn suffix_array(arr: &[i32]) -> Vec<usize> {
    let mut with_sentinel = Vec::with_capacity(arr.len() + 1);
    with_sentinel.extend_from_slice(arr);
    with_sentinel.push(-1);
    let mut sa = sort_cyclic_shifts(&with_sentinel);
    // The shift starting at the sentinel sorts first; drop it.
    sa.remove(0);
    sa
}

/// Kasai's LCP construction over the suffix array.
fn lcp_array(arr: &[i32], sa: &[usize]) -> Vec<usize> {
    let n = arr.len();
    let mut rank = vec![0usize; n];
    for (i, &suffix) in sa.iter().enumerate() {
        rank[suffix] = i;
    }
    let mut lcp = vec![0usize; n];
    let mut h = 0usize;
    for i in 0..n {
        if rank[i] > 0 {
            let j = sa[rank[i] - 1];
            while i + h < n && j + h < n && arr[i + h] == arr[j + h] {
                h += 1;
            }
            lcp[rank[i]] = h;
            h = h.saturating_sub(1);
        }
    }
    lcp
}

/// Replaces every non-overlapping occurrence of `part` (leftmost first, no
/// re-entry across a match) with the single code `replacement`.
fn replace_occurrences(source: &[i32], part: &[i32], replacement: i32) -> Vec<i32> {
    let mut pi = vec![0usize; part.len()];
    for i in 1..part.len() {
        let mut len = pi[i - 1];
        while len > 0 && part[i] != part[len] {
            len = pi[len - 1];
        }
        if part[i] == part[len] {
            len += 1;
        }
        pi[i] = len;
    }

    let mut result = Vec::with_capacity(source.len());
    let mut len = 0;
    for &code in source {
        while len > 0 && code != part[len] {
            len = pi[len - 1];
        }
        if code == part[len] {
            len += 1;
        }
        result.push(code);
        if len == part.len() {
            result.truncate(result.len() - part.len());
            result.push(replacement);
            len = 0;
        }
    }
    result
}

#[derive(Enum, Copy, Clone)]
enum Bracket {
    Paren,
    Square,
    Curly,
}

fn bracket_delta(spelling: &str) -> Option<(Bracket, i32)> {
    match spelling {
        "(" => Some((Bracket::Paren, 1)),
        ")" => Some((Bracket::Paren, -1)),
        "[" => Some((Bracket::Square, 1)),
        "]" => Some((Bracket::Square, -1)),
        "{" => Some((Bracket::Curly, 1)),
        "}" => Some((Bracket::Curly, -1)),
        _ => None,
    }
}

/// The bracket-balance filter.  Rejects any prefix that closes a bracket it
/// never opened, then drops trailing tokens until what remains is balanced;
/// what survives may still be worth extracting (a candidate like
/// `printf ( "%d" ,` keeps its `printf`).
fn nice_truncate(part: &mut Vec<i32>, infos: &[CodeInfo]) {
    let mut counts: EnumMap<Bracket, i32> = EnumMap::default();
    let mut good_including = Vec::with_capacity(part.len());
    let mut matched = true;
    for &code in part.iter() {
        if let Some((bracket, delta)) = bracket_delta(&infos[code as usize].spelling) {
            counts[bracket] += delta;
        }
        if counts.values().any(|&count| count < 0) {
            matched = false;
        }
        good_including.push(matched);
    }

    while let Some(&last) = part.last() {
        let balanced = counts.values().all(|&count| count == 0);
        if *good_including.last().unwrap() && balanced {
            return;
        }
        part.pop();
        good_including.pop();
        if let Some((bracket, delta)) = bracket_delta(&infos[last as usize].spelling) {
            counts[bracket] -= delta;
        }
    }
}

/// Finds the candidate whose extraction yields the smallest total serialized
/// length, considering the one candidate per suffix-array adjacency.
fn most_valuable_run(
    stream: &[i32],
    infos: &[CodeInfo],
    replacement: i32,
    nice: bool,
) -> Option<(usize, Vec<i32>)> {
    let define_base = "#define ".len() + " ".len() + "\n".len();
    let sa = suffix_array(stream);
    let lcp = lcp_array(stream, &sa);

    let mut best: Option<(usize, Vec<i32>)> = None;
    for i in 1..stream.len() {
        let length = lcp[i];
        if length == 0 {
            continue;
        }
        let start = sa[i];

        // Protected codes never enter a candidate; keep the prefix before
        // the first one.
        let mut part: Vec<i32> = stream[start..start + length]
            .iter()
            .copied()
            .take_while(|&code| !infos[code as usize].protected)
            .collect();
        if nice {
            nice_truncate(&mut part, infos);
        }
        if part.is_empty() {
            continue;
        }

        let replaced = replace_occurrences(stream, &part, replacement);
        let total = serialized_len(&replaced, infos)
            + define_base
            + infos[replacement as usize].weight
            + serialized_len(&part, infos);
        if best.as_ref().is_none_or(|(min, _)| total < *min) {
            best = Some((total, part));
        }
    }
    best
}

fn push_code(infos: &mut Vec<CodeInfo>, spelling: &str) -> i32 {
    infos.push(CodeInfo {
        spelling: spelling.into(),
        is_pp: false,
        is_punct: false,
        protected: false,
        weight: spelling.len(),
    });
    (infos.len() - 1) as i32
}

/// Runs the pass over the whole file.  Returns the rewritten contents, or
/// `None` when no define pays for itself.  `first_symbol` continues the
/// numbering where identifier minification stopped.
pub fn run(
    file: &SourceFile,
    macro_names: &HashSet<String>,
    first_symbol: u64,
    nice: bool,
) -> Result<Option<String>, PassError> {
    let text = file.contents();
    let tokens = scan_classified(text).map_err(|e| PassError::scan(Pass::AddDefines, file, e))?;
    if tokens.is_empty() {
        return Ok(None);
    }
    let (mut stream, mut infos) = encode(&tokens);

    // Reserve every spelling in the stream; a define name equal to any
    // identifier token would be macro-expanded at each of its occurrences.
    let mut reserved: HashSet<String> = infos.iter().map(|info| info.spelling.clone()).collect();

    let (mut next_index, mut name) = next_free_name(first_symbol, &reserved, macro_names);
    let mut replacement = push_code(&mut infos, &name);

    let mut defines: Vec<String> = Vec::new();
    let mut cur_len = serialized_len(&stream, &infos);
    while let Some((total, part)) = most_valuable_run(&stream, &infos, replacement, nice) {
        if total >= cur_len {
            break;
        }
        stream = replace_occurrences(&stream, &part, replacement);
        let body = part
            .iter()
            .map(|&code| infos[code as usize].spelling.as_str())
            .join(" ");
        debug!("AddDefines: #define {name} {body} (total {total} < {cur_len})");
        defines.push(format!("#define {name} {body}\n"));

        cur_len = serialized_len(&stream, &infos);
        reserved.insert(name.to_string());
        let minted = next_free_name(next_index, &reserved, macro_names);
        next_index = minted.0;
        name = minted.1;
        replacement = push_code(&mut infos, &name);
    }

    if defines.is_empty() {
        return Ok(None);
    }
    let mut result = defines.concat();
    result.push_str(
        &stream
            .iter()
            .map(|&code| infos[code as usize].spelling.as_str())
            .join(" "),
    );
    Ok(Some(result))
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use crate::lex::classify::scan_classified;
    use crate::source::SourceFile;

    use super::{
        encode, lcp_array, nice_truncate, replace_occurrences, run, serialized_len, suffix_array,
    };

    /// Reference implementation: sort suffix start positions by the suffix
    /// contents.
    fn naive_suffix_array(arr: &[i32]) -> Vec<usize> {
        let mut sa: Vec<usize> = (0..arr.len()).collect();
        sa.sort_by(|&a, &b| arr[a..].cmp(&arr[b..]));
        sa
    }

    #[test]
    fn test_suffix_array_matches_naive() {
        for arr in [
            vec![0, 1, 0, 1, 2],
            vec![3, 3, 3, 3],
            vec![5],
            vec![2, 1, 0, 2, 1, 0, 2, 1],
            vec![0, 1, 2, 3, 4, 5, 6, 7, 0, 1, 2, 3],
        ] {
            assert_eq!(suffix_array(&arr), naive_suffix_array(&arr), "{arr:?}");
        }
    }

    #[test]
    fn test_lcp() {
        // "banana"-like: [b,a,n,a,n,a] with codes.
        let arr = vec![1, 0, 2, 0, 2, 0];
        let sa = suffix_array(&arr);
        let lcp = lcp_array(&arr, &sa);
        // Suffix order: a(5), ana(3), anana(1), banana(0), na(4), nana(2).
        assert_eq!(sa, vec![5, 3, 1, 0, 4, 2]);
        assert_eq!(lcp, vec![0, 1, 3, 0, 0, 2]);
    }

    #[test]
    fn test_replace_non_overlapping() {
        // In [a,a,a,a], [a,a] matches at 0 and 2 only.
        assert_eq!(replace_occurrences(&[0, 0, 0, 0], &[0, 0], 9), vec![9, 9]);
        assert_eq!(
            replace_occurrences(&[1, 0, 0, 2, 0, 0], &[0, 0], 9),
            vec![1, 9, 2, 9]
        );
        // No match leaves the stream alone.
        assert_eq!(replace_occurrences(&[1, 2, 3], &[4], 9), vec![1, 2, 3]);
    }

    #[test]
    fn test_serialized_len_separators() {
        let (stream, infos) = encode(&scan_classified("int x = 1 ;").unwrap());
        // "int x=1;" : 3 + 1 + 1 + 1 + 1 + 1 separator (int/x).
        assert_eq!(serialized_len(&stream, &infos), 8);

        let (stream, infos) = encode(&scan_classified("f ( x )").unwrap());
        // "f(x)": no separators around punctuators.
        assert_eq!(serialized_len(&stream, &infos), 4);
    }

    #[test]
    fn test_nice_truncate() {
        let (stream, infos) = encode(&scan_classified("printf ( \"%d\" ,").unwrap());
        let mut part = stream.clone();
        nice_truncate(&mut part, &infos);
        assert_eq!(part.len(), 1);
        assert_eq!(infos[part[0] as usize].spelling, "printf");

        // Balanced input survives whole.
        let (stream, infos) = encode(&scan_classified("f ( x )").unwrap());
        let mut part = stream.clone();
        nice_truncate(&mut part, &infos);
        assert_eq!(part.len(), 4);

        // A close without an open kills everything before it recovers.
        let (stream, infos) = encode(&scan_classified(") x").unwrap());
        let mut part = stream.clone();
        nice_truncate(&mut part, &infos);
        assert!(part.is_empty());
    }

    #[test]
    fn test_extracts_repeated_run() {
        let src = "x=longname1+longname2;y=longname1+longname2;z=longname1+longname2;";
        let file = SourceFile::new(src.into(), None);
        let result = run(&file, &HashSet::new(), 0, true).unwrap().unwrap();
        let first_line = result.lines().next().unwrap();
        assert!(first_line.starts_with("#define a "), "{result}");
        // The run survives only inside the define body.
        assert_eq!(result.matches("longname1").count(), 1, "{result}");
    }

    #[test]
    fn test_no_define_when_not_worth_it() {
        let file = SourceFile::new("int main(){return 0;}".into(), None);
        assert!(run(&file, &HashSet::new(), 0, true).unwrap().is_none());
    }

    #[test]
    fn test_main_never_extracted() {
        // `main` repeats, but it is protected.
        let src = "int main();int notmain1(){main();main();}int notmain2(){main();main();}";
        let file = SourceFile::new(src.into(), None);
        if let Some(result) = run(&file, &HashSet::new(), 0, true).unwrap() {
            for line in result.lines().filter(|l| l.starts_with("#define")) {
                assert!(!line.contains("main"), "{line}");
            }
        }
    }

    #[test]
    fn test_reserved_names_respected() {
        let src = "x=longname1+longname2;y=longname1+longname2;z=longname1+longname2;";
        let file = SourceFile::new(src.into(), None);
        let macros: HashSet<String> = ["a"].into_iter().map(String::from).collect();
        let result = run(&file, &macros, 0, true).unwrap().unwrap();
        assert!(result.lines().next().unwrap().starts_with("#define b "));
    }

    #[test]
    fn test_model_length_shrinks() {
        let src = "x=longname1+longname2;y=longname1+longname2;z=longname1+longname2;";
        let file = SourceFile::new(src.into(), None);
        let result = run(&file, &HashSet::new(), 0, true).unwrap().unwrap();
        let before = {
            let (stream, infos) = encode(&scan_classified(src).unwrap());
            serialized_len(&stream, &infos)
        };
        let after = {
            let (stream, infos) = encode(&scan_classified(&result).unwrap());
            serialized_len(&stream, &infos)
        };
        assert!(after < before, "{after} >= {before}");
    }
}

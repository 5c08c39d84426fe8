// Rust lacks the HashMap and BTreeMap equivalents of vec!

/// Generates the code to initialize a [HashMap](std::collections::HashMap).
///
/// The macro can be followed by parentheses or square brackets.
///
/// # Example
/// ```
/// # use std::collections::HashMap;
/// # use fsmgen::hashmap;
/// let days = hashmap![0 => "Monday", 1 => "Tuesday", 2 => "Wednesday"];
/// assert_eq!(days, HashMap::from([(0, "Monday"), (1, "Tuesday"), (2, "Wednesday")]));
/// ```
#[macro_export(local_inner_macros)]
macro_rules! hashmap {
    () => { HashMap::new() };
    ($($key:expr => $value:expr,)+) => { hashmap!($($key => $value),+) };
    ($($key:expr => $value:expr),*) => {
        HashMap::from([ $(($key, $value),)* ])
    };
}

/// Generates the code to initialize a [BTreeMap](std::collections::BTreeMap).
///
/// The macro can be followed by parentheses or square brackets.
#[macro_export(local_inner_macros)]
macro_rules! btreemap {
    () => { BTreeMap::new() };
    ($($key:expr => $value:expr,)+) => { btreemap!($($key => $value),+) };
    ($($key:expr => $value:expr),*) => {
        BTreeMap::from([ $(($key, $value),)* ])
    };
}

/// Generates the code to initialize a [BTreeSet](std::collections::BTreeSet).
///
/// The macro can be followed by parentheses or square brackets.
#[macro_export(local_inner_macros)]
macro_rules! btreeset {
    () => { BTreeSet::new() };
    ($($key:expr,)+) => { btreeset!($($key),+) };
    ($($key:expr),*) => { BTreeSet::from([ $($key,)* ]) };
}

mod tests {
    #![allow(unused_imports)]
    use std::collections::{BTreeMap, BTreeSet, HashMap};

    #[test]
    fn hashmap() {
        let h = hashmap!(
            'a' => hashmap!(
                '1' => 'a',
                '2' => 'A'
            ),
            'b' => hashmap!['1' => 'b', '2' => 'B',],
            'c' => hashmap!()
        );
        assert_eq!(h, HashMap::from([('a', HashMap::from([('1', 'a'), ('2', 'A')])), ('b', HashMap::from([('1', 'b'), ('2', 'B')])), ('c', HashMap::new())]))
    }

    #[test]
    fn btreemap_set() {
        let m = btreemap![1 => "one", 2 => "two"];
        assert_eq!(m, BTreeMap::from([(1, "one"), (2, "two")]));
        let s1 = btreeset![1, 3, 5, 7];
        let s2 = btreeset!();
        assert_eq!(s1, BTreeSet::from([1, 3, 5, 7]));
        assert_eq!(s2, BTreeSet::<i32>::from([]));
    }
}

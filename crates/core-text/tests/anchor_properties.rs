use core_text::{Bias, Document};
use proptest::collection::vec;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Insert(usize, String),
    Remove(usize, usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<usize>(), "[ab\n]{1,3}").prop_map(|(at, s)| Op::Insert(at, s)),
        (any::<usize>(), 1usize..4).prop_map(|(at, n)| Op::Remove(at, n)),
    ]
}

fn marker_offset(text: &str) -> usize {
    text.chars().position(|c| c == '|').unwrap()
}

proptest! {
    #[test]
    fn forward_anchor_follows_marker(prefix in "[ab]{0,8}", ops in vec(op(), 1..24)) {
        let initial = format!("{prefix}|tail");
        let doc = Document::new(&initial);
        let anchor = doc.create_anchor(marker_offset(&initial), Bias::Forward).unwrap();
        let mut model: Vec<char> = initial.chars().collect();
        for op in ops {
            match op {
                Op::Insert(at, s) => {
                    let at = at % (model.len() + 1);
                    doc.insert(at, &s).unwrap();
                    model.splice(at..at, s.chars());
                }
                Op::Remove(at, n) => {
                    let at = at % model.len();
                    let n = n.min(model.len() - at);
                    let marker = model.iter().position(|&c| c == '|').unwrap();
                    if (at..at + n).contains(&marker) {
                        continue;
                    }
                    doc.remove(at, n).unwrap();
                    model.drain(at..at + n);
                }
            }
            let text: String = model.iter().collect();
            prop_assert_eq!(doc.snapshot().slice(0..doc.len_chars()), text.clone());
            prop_assert_eq!(anchor.offset(), marker_offset(&text));
        }
    }
}

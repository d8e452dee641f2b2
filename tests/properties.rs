use unitree::prelude::*;

use rand::prelude::*;
use rand_distr::{Distribution, Normal, Uniform};

use std::collections::{HashSet, VecDeque};


const SEED: u64 = 1234;
const N_TREES: usize = 8;
const N_ROWS: usize = 200;
const MAX_DEPTH: usize = 6;


fn variables() -> Vec<VariableDescriptor> {
    vec![
        VariableDescriptor::numeric("x"),
        VariableDescriptor::factor("y", ["a", "b", "c", "d"]),
        VariableDescriptor::ordered("z", ["lo", "mid", "hi"]),
    ]
}


/// Grows a random tree breadth first, so ids increase level by level.
fn random_tree<R: Rng>(rng: &mut R) -> Vec<Node> {
    let normal = Normal::new(0.0, 1.0).unwrap();
    let mut slots: Vec<Option<Node>> = vec![None];
    let mut queue = VecDeque::from([(1_usize, 0_usize)]);

    while let Some((id, depth)) = queue.pop_front() {
        let value = Prediction::Value(normal.sample(rng));
        let node = if depth < MAX_DEPTH && rng.gen_bool(0.7) {
            let (left, right) = (slots.len() + 1, slots.len() + 2);
            slots.push(None);
            slots.push(None);
            queue.push_back((left, depth + 1));
            queue.push_back((right, depth + 1));

            let split = match rng.gen_range(0..3) {
                0 => Split::threshold(0, normal.sample(rng)),
                1 => {
                    let levels = (0..4)
                        .filter(|_| rng.gen_bool(0.5))
                        .collect::<Vec<usize>>();
                    Split::subset(1, 4, levels)
                },
                _ => Split::threshold(2, rng.gen_range(0..3) as f64),
            };
            let missing = match rng.gen_range(0..3) {
                0 => MissingBranch::Left,
                1 => MissingBranch::Right,
                _ => MissingBranch::Undefined,
            };
            Node::branch(id, split, left, right, value).missing(missing)
        } else {
            Node::leaf(id, value)
        };
        slots[id - 1] = Some(node);
    }

    slots.into_iter()
        .map(|node| node.unwrap())
        .collect()
}


fn random_forest<R: Rng>(rng: &mut R) -> Forest {
    let trees = (0..N_TREES)
        .map(|_| random_tree(rng))
        .collect::<Vec<_>>();
    Forest::new(variables(), Target::Regression, trees).unwrap()
}


/// Random observations; a value is missing with probability `missing`.
fn random_sample<R: Rng>(rng: &mut R, missing: f64) -> Sample {
    let normal = Normal::new(0.0, 1.5).unwrap();
    let y = Uniform::new(0, 4);
    let z = Uniform::new(0, 3);

    let draw = |value: f64, rng: &mut R| {
        if rng.gen_bool(missing) { f64::NAN } else { value }
    };
    let rows = (0..N_ROWS)
        .map(|_| {
            let x = normal.sample(rng);
            let y = y.sample(rng) as f64;
            let z = z.sample(rng) as f64;
            vec![draw(x, rng), draw(y, rng), draw(z, rng)]
        })
        .collect::<Vec<_>>();
    Sample::from_rows(["x", "y", "z"], rows).unwrap()
}


#[test]
fn every_node_has_one_parent() {
    let mut rng = StdRng::seed_from_u64(SEED);
    let forest = random_forest(&mut rng);

    for tree in forest.trees() {
        let mut referenced = vec![0_usize; tree.len()];
        for node in tree.nodes() {
            for child in [node.left(), node.right()].into_iter().flatten() {
                referenced[child.index()] += 1;
            }
        }
        assert_eq!(referenced[0], 0, "the root is referenced");
        assert!(referenced[1..].iter().all(|&n| n == 1));
        assert_eq!(tree.parent(NodeId::ROOT), None);
    }
}


#[test]
fn traversal_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(SEED);
    let forest = random_forest(&mut rng);
    let sample = random_sample(&mut rng, 0.0);

    let first = Predictor::new(&forest).traverse(&sample).unwrap();
    let exp = first.membership().unwrap();
    for chunk_size in [1, 7, 64, 1000] {
        let res = Predictor::new(&forest)
            .chunk_size(chunk_size)
            .traverse(&sample)
            .unwrap();
        assert_eq!(first.terminal_nodes(), res.terminal_nodes());
        assert_eq!(Some(exp), res.membership());
    }
}


#[test]
fn membership_follows_root_paths() {
    let mut rng = StdRng::seed_from_u64(SEED);
    let forest = random_forest(&mut rng);
    let sample = random_sample(&mut rng, 0.0);

    let traversal = Predictor::new(&forest).traverse(&sample).unwrap();
    let membership = traversal.membership().unwrap();
    let terminal = traversal.terminal_nodes();
    assert_eq!(membership.shape(), (N_ROWS, forest.n_nodes()));

    for row in 0..N_ROWS {
        let nodes = membership.row(row);
        for (t, tree) in forest.trees().iter().enumerate() {
            let leaf = terminal.get(row, t).unwrap();
            assert!(tree.node(leaf).unwrap().is_terminal());

            // The visited nodes are exactly the root path of the leaf.
            let mut exp = tree.path(leaf)
                .into_iter()
                .map(|(id, _)| NodeColumn { tree: t, node: id })
                .collect::<Vec<_>>();
            exp.push(NodeColumn { tree: t, node: leaf });
            exp.sort();
            let res = nodes.iter()
                .copied()
                .filter(|col| col.tree == t)
                .collect::<Vec<_>>();
            assert_eq!(exp, res, "expected {exp:?}, got {res:?}.");
        }
    }
}


#[test]
fn streaming_fails_exactly_the_strict_failures() {
    let mut rng = StdRng::seed_from_u64(SEED);
    let forest = random_forest(&mut rng);
    let sample = random_sample(&mut rng, 0.2);

    let traversal = Predictor::new(&forest)
        .missing_policy(MissingPolicy::Streaming)
        .traverse(&sample)
        .unwrap();
    let failed = traversal.failed_rows()
        .into_iter()
        .collect::<HashSet<_>>();
    let membership = traversal.membership().unwrap();

    for row in 0..N_ROWS {
        let values = sample.names()
            .iter()
            .map(|name| sample.column(name).unwrap()[row])
            .collect::<Vec<_>>();
        let single = Sample::from_rows(["x", "y", "z"], vec![values]).unwrap();
        let strict = Predictor::new(&forest).membership(&single);

        assert_eq!(strict.is_err(), failed.contains(&row), "row {row}");
        match strict {
            Ok(strict) => assert_eq!(strict.row(0), membership.row(row)),
            Err(ForestError::MissingValue { .. }) => {
                assert!(membership.row(row).is_empty());
            },
            Err(err) => panic!("unexpected error {err:?}"),
        }
    }
}


#[test]
fn rules_never_repeat_a_variable() {
    let mut rng = StdRng::seed_from_u64(SEED);
    let forest = random_forest(&mut rng);
    let renderer = RuleRenderer::new(&forest);

    for t in 0..forest.n_trees() {
        for rule in renderer.render_tree(t).unwrap() {
            let names = rule.conditions()
                .iter()
                .map(|c| c.variable())
                .collect::<Vec<_>>();
            let unique = names.iter().collect::<HashSet<_>>();
            assert_eq!(names.len(), unique.len(), "{rule}");
        }
    }
}


#[test]
fn duplicates_are_stable_and_equivalent() {
    let mut rng = StdRng::seed_from_u64(SEED);
    let forest = random_forest(&mut rng);
    let renderer = RuleRenderer::new(&forest);

    let marks = find_forest_duplicates(&forest);
    assert_eq!(marks, find_forest_duplicates(&forest));

    let pairs = duplicate_pairs(&forest);
    let n_marked = marks.iter()
        .map(|tree| tree.iter().filter(|&&m| m).count())
        .sum::<usize>();
    assert_eq!(n_marked, pairs.len());

    for (duplicate, original) in pairs {
        assert!(original < duplicate);
        assert!(!marks[original.tree][original.node.index()]);
        let lhs = renderer.render(duplicate.tree, duplicate.node).unwrap();
        let rhs = renderer.render(original.tree, original.node).unwrap();
        assert_eq!(lhs.to_string(), rhs.to_string());
    }

    // Within one tree, the tree-local marks agree with the forest scan
    // restricted to the first tree.
    let first = find_duplicates(forest.tree(0), forest.variables());
    assert_eq!(first, marks[0]);
}


#[test]
fn rule_support_matches_membership() {
    let mut rng = StdRng::seed_from_u64(SEED);
    let forest = random_forest(&mut rng);
    let sample = random_sample(&mut rng, 0.0);
    let response = Response::Numeric(vec![1.0; N_ROWS]);

    let membership = Predictor::new(&forest).membership(&sample).unwrap();
    let support = membership.support();
    let renderer = RuleRenderer::new(&forest).data(&sample, &response);

    for (col, column) in membership.columns().iter().enumerate() {
        let rule = renderer.render(column.tree, column.node).unwrap();
        let stats = rule.stats().unwrap();
        assert_eq!(stats.support, support[col], "{column}");
    }
}

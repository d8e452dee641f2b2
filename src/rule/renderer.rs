//! Renders the split path of a node as a predicate,
//! optionally with statistics over supplied data.
use rayon::prelude::*;

use std::fmt;

use crate::constants::{EMPTY_RULE, PREC_WIDTH, RULE_SEPARATOR};
use crate::error::{ForestError, Location, Result};
use crate::forest::Forest;
use crate::sample::{Response, Sample};
use crate::tree::{LeftRight, NodeId, NodeTable};
use crate::variable::VariableDescriptor;

use super::constraint::{Constraint, PathConstraints};


/// The combined constraint on one variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `lower < variable <= upper`, a missing bound is unbounded.
    Range {
        /// Variable label.
        variable: String,
        /// Exclusive lower bound.
        lower: Option<f64>,
        /// Inclusive upper bound.
        upper: Option<f64>,
    },
    /// `variable in {levels}`.
    Levels {
        /// Variable label.
        variable: String,
        /// Level names, in level-code order.
        levels: Vec<String>,
    },
}


impl Condition {
    fn new(constraint: &Constraint, variable: &VariableDescriptor) -> Self {
        let name = variable.name().to_string();
        match constraint {
            Constraint::Range { lower, upper } => {
                Self::Range { variable: name, lower: *lower, upper: *upper }
            },
            Constraint::Levels(bits) => {
                let levels = bits.ones()
                    .map(|code| variable.level_name(code))
                    .collect();
                Self::Levels { variable: name, levels }
            },
        }
    }


    /// Returns the label of the constrained variable.
    pub fn variable(&self) -> &str {
        match self {
            Self::Range { variable, .. } => variable,
            Self::Levels { variable, .. } => variable,
        }
    }
}


impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Range { variable, lower: Some(l), upper: Some(u) } => {
                let (lop, l) = lower_bound(*l);
                let (uop, u) = upper_bound(*u);
                write!(f, "{l} {lop} {variable} {uop} {u}")
            },
            Self::Range { variable, lower: Some(l), upper: None } => {
                let (lop, l) = lower_bound(*l);
                let lop = if lop == "<" { ">" } else { ">=" };
                write!(f, "{variable} {lop} {l}")
            },
            Self::Range { variable, lower: None, upper: Some(u) } => {
                let (uop, u) = upper_bound(*u);
                write!(f, "{variable} {uop} {u}")
            },
            Self::Range { variable, lower: None, upper: None } => {
                write!(f, "{variable} is any")
            },
            Self::Levels { variable, levels } => {
                write!(f, "{variable} in {{{}}}", levels.join(", "))
            },
        }
    }
}


/// Returns the smallest `f64` strictly greater than `x`.
fn next_up(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        return x;
    }
    if x == 0f64 {
        return f64::from_bits(1);
    }
    let bits = x.to_bits();
    let up = if x > 0f64 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    };
    up + 0f64
}


/// Returns `next_up(x)` if `x` is the `<=` image of a strict `< next_up(x)`,
/// i.e., if `next_up(x)` prints shorter than `x`.
fn strict_bound(x: f64) -> Option<f64> {
    if !x.is_finite() {
        return None;
    }
    let up = next_up(x);
    (up.is_finite() && up.to_string().len() < x.to_string().len())
        .then_some(up)
}


/// The operator and value of an upper bound `x <= u`.
fn upper_bound(u: f64) -> (&'static str, f64) {
    match strict_bound(u) {
        Some(up) => ("<", up),
        None => ("<=", u),
    }
}


/// The operator and value of a lower bound `l < x`,
/// written with the bound on the left.
fn lower_bound(l: f64) -> (&'static str, f64) {
    match strict_bound(l) {
        Some(up) => ("<=", up),
        None => ("<", l),
    }
}


/// Summary of the response over the observations
/// that reach a node.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseSummary {
    /// Mean of a numeric response, `None` if no observation reaches.
    Mean(Option<f64>),
    /// Class table of a class response.
    Classes {
        /// Class labels.
        labels: Vec<String>,
        /// Number of observations per class.
        counts: Vec<usize>,
        /// Share of observations per class.
        /// All zero if no observation reaches.
        proportions: Vec<f64>,
    },
}


impl fmt::Display for ResponseSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mean(Some(mean)) => write!(f, "mean = {mean:.PREC_WIDTH$}"),
            Self::Mean(None) => write!(f, "mean = NA"),
            Self::Classes { labels, counts, proportions } => {
                let table = labels.iter()
                    .zip(counts)
                    .zip(proportions)
                    .map(|((label, count), p)| {
                        format!("{label}: {count} ({p:.PREC_WIDTH$})")
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{{{table}}}")
            },
        }
    }
}


/// Statistics of a rule over supplied data.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleStats {
    /// Number of observations whose path passes through the node.
    pub support: usize,
    /// Response summary over those observations.
    pub summary: ResponseSummary,
}


impl fmt::Display for RuleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "support = {}, {}", self.support, self.summary)
    }
}


/// The predicate of one node: one condition per constrained variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    tree: usize,
    node: NodeId,
    conditions: Vec<Condition>,
    stats: Option<RuleStats>,
}


impl Rule {
    /// Returns the tree index of the node.
    #[inline]
    pub fn tree(&self) -> usize {
        self.tree
    }


    /// Returns the node id.
    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }


    /// Returns the conditions in descriptor order.
    #[inline]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions[..]
    }


    /// Returns the statistics over the supplied data, if any.
    #[inline]
    pub fn stats(&self) -> Option<&RuleStats> {
        self.stats.as_ref()
    }
}


impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conditions.is_empty() {
            return write!(f, "{EMPTY_RULE}");
        }
        let text = self.conditions.iter()
            .map(|condition| condition.to_string())
            .collect::<Vec<_>>()
            .join(RULE_SEPARATOR);
        write!(f, "{text}")
    }
}


/// Renders the split path of `node` in `tree`.
/// A variable met several times on the path yields one condition.
///
/// ```no_run
/// use unitree::{render_rule, Forest, NodeId};
///
/// # fn run(forest: &Forest) -> unitree::Result<()> {
/// let rule = render_rule(forest.tree(0), NodeId(4), forest.variables())?;
/// println!("{rule}");
/// # Ok(())
/// # }
/// ```
pub fn render_rule(
    tree: &NodeTable,
    node: NodeId,
    variables: &[VariableDescriptor],
) -> Result<Rule>
{
    check_node(tree, node)?;
    let constraints = PathConstraints::of(tree, node, variables);
    let conditions = constraints.iter()
        .map(|(index, constraint)| Condition::new(constraint, &variables[index]))
        .collect();
    Ok(Rule { tree: tree.tree_index(), node, conditions, stats: None })
}


fn check_node(tree: &NodeTable, node: NodeId) -> Result<()> {
    if tree.node(node).is_none() {
        let location = Location::Node { tree: tree.tree_index(), node };
        let reason = format!("the tree has {} nodes", tree.len());
        return Err(ForestError::schema(location, reason));
    }
    Ok(())
}


/// A struct that renders the rules of a [`Forest`].
///
/// # Example
/// ```no_run
/// use unitree::prelude::*;
///
/// # fn run(forest: &Forest, sample: &Sample, y: &Response) -> unitree::Result<()> {
/// let rule = RuleRenderer::new(forest)
///     .data(sample, y)
///     .render(0, NodeId(3))?;
/// println!("{rule}    [{}]", rule.stats().unwrap());
/// # Ok(())
/// # }
/// ```
pub struct RuleRenderer<'a> {
    forest: &'a Forest,
    data: Option<(&'a Sample, &'a Response)>,
}


impl<'a> RuleRenderer<'a> {
    /// Construct a new instance of [`RuleRenderer`].
    pub fn new(forest: &'a Forest) -> Self {
        Self { forest, data: None }
    }


    /// Attach observations and their response.
    /// Every rendered rule then carries [`RuleStats`].
    pub fn data(mut self, sample: &'a Sample, response: &'a Response) -> Self {
        self.data = Some((sample, response));
        self
    }


    /// Renders node `node` of the `tree`-th tree.
    pub fn render(&self, tree: usize, node: NodeId) -> Result<Rule> {
        let table = self.table(tree)?;
        let mut rule = render_rule(table, node, self.forest.variables())?;
        if let Some((sample, response)) = self.data {
            rule.stats = Some(self.stats(table, node, sample, response)?);
        }
        Ok(rule)
    }


    /// Renders every node of the `tree`-th tree in id order.
    pub fn render_tree(&self, tree: usize) -> Result<Vec<Rule>> {
        let table = self.table(tree)?;
        (0..table.len())
            .map(|ix| self.render(tree, NodeId::from_index(ix)))
            .collect()
    }


    fn table(&self, tree: usize) -> Result<&'a NodeTable> {
        self.forest.trees()
            .get(tree)
            .ok_or_else(|| {
                let reason = format!(
                    "tree {tree} does not exist. The forest has {} trees",
                    self.forest.n_trees()
                );
                ForestError::schema(Location::Model, reason)
            })
    }


    fn stats(
        &self,
        tree: &NodeTable,
        node: NodeId,
        sample: &Sample,
        response: &Response,
    ) -> Result<RuleStats>
    {
        let n_rows = sample.shape().0;
        if response.len() != n_rows {
            let reason = format!(
                "the response has {} values, the sample has {n_rows} rows",
                response.len()
            );
            return Err(ForestError::schema(Location::Model, reason));
        }

        let columns = sample.align(self.forest.variables())?;
        let path = tree.path(node);
        let rows = (0..n_rows).into_par_iter()
            .filter(|&row| reaches(tree, &path, sample, &columns, row))
            .collect::<Vec<_>>();

        let summary = summarize(response, &rows)?;
        Ok(RuleStats { support: rows.len(), summary })
    }
}


/// Returns `true` if the `row`-th observation takes every step of `path`.
/// A missing value without a defined missing branch does not match.
fn reaches(
    tree: &NodeTable,
    path: &[(NodeId, LeftRight)],
    sample: &Sample,
    columns: &[usize],
    row: usize,
) -> bool
{
    path.iter().all(|&(ancestor, direction)| {
        let node = tree.at(ancestor);
        let split = match node.split() {
            Some(split) => split,
            None => return false,
        };
        let taken = match sample.value(row, columns[split.variable()]) {
            Some(value) => Some(split.route(value)),
            None => node.missing_branch().route(),
        };
        taken == Some(direction)
    })
}


fn summarize(response: &Response, rows: &[usize]) -> Result<ResponseSummary> {
    let summary = match response {
        Response::Numeric(values) => {
            let mean = (!rows.is_empty()).then(|| {
                rows.iter().map(|&row| values[row]).sum::<f64>()
                    / rows.len() as f64
            });
            ResponseSummary::Mean(mean)
        },
        Response::Classes { codes, labels } => {
            let mut counts = vec![0_usize; labels.len()];
            for &row in rows {
                let code = codes[row];
                if code >= labels.len() {
                    let reason = format!(
                        "class code {code} at row {row}, \
                        but {} labels are given",
                        labels.len()
                    );
                    return Err(ForestError::schema(Location::Model, reason));
                }
                counts[code] += 1;
            }
            let total = rows.len().max(1) as f64;
            let proportions = counts.iter()
                .map(|&count| count as f64 / total)
                .collect();
            ResponseSummary::Classes {
                labels: labels.clone(),
                counts,
                proportions,
            }
        },
    };
    Ok(summary)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Target;
    use crate::tree::{MissingBranch, Node, Prediction, Split};

    // x <= 5 ? (y in {a, b} ? (x <= 2 ? 4 : 5) : 6) : 7
    fn forest() -> Forest {
        let variables = vec![
            VariableDescriptor::numeric("x"),
            VariableDescriptor::factor("y", ["a", "b", "c"]),
        ];
        let tree = vec![
            Node::branch(1, Split::threshold(0, 5.0), 2, 7, Prediction::Value(0.0))
                .missing(MissingBranch::Left),
            Node::branch(2, Split::subset(1, 3, [0, 1]), 3, 6, Prediction::Value(0.0)),
            Node::branch(3, Split::threshold(0, 2.0), 4, 5, Prediction::Value(0.0)),
            Node::leaf(4, Prediction::Value(0.0)),
            Node::leaf(5, Prediction::Value(0.0)),
            Node::leaf(6, Prediction::Value(0.0)),
            Node::leaf(7, Prediction::Value(0.0)),
        ];
        Forest::new(variables, Target::Regression, vec![tree]).unwrap()
    }

    #[test]
    fn test_render() {
        let forest = forest();
        let renderer = RuleRenderer::new(&forest);
        let cases = [
            (1, "TRUE"),
            (2, "x <= 5"),
            (5, "2 < x <= 5 & y in {a, b}"),
            (6, "x <= 5 & y in {c}"),
            (7, "x > 5"),
        ];
        for (id, exp) in cases {
            let res = renderer.render(0, NodeId(id)).unwrap().to_string();
            assert_eq!(exp, res, "expected {exp:?}, got {res:?}.");
        }
    }

    #[test]
    fn test_strict_bounds() {
        use crate::adapter::gradient_boosting::next_down;

        let cases = [
            (None, Some(next_down(0.5)), "x < 0.5"),
            (Some(next_down(0.5)), None, "x >= 0.5"),
            (Some(next_down(-1.0)), Some(next_down(2.0)), "-1 <= x < 2"),
            (Some(next_down(0.0)), None, "x >= 0"),
            (Some(2.5), Some(5.0), "2.5 < x <= 5"),
        ];
        for (lower, upper, exp) in cases {
            let condition = Condition::Range {
                variable: "x".to_string(), lower, upper,
            };
            let res = condition.to_string();
            assert_eq!(exp, res, "expected {exp:?}, got {res:?}.");
        }
    }

    #[test]
    fn test_out_of_range_node() {
        let forest = forest();
        let res = render_rule(forest.tree(0), NodeId(8), forest.variables());
        assert!(res.is_err());
        assert!(RuleRenderer::new(&forest).render(1, NodeId(1)).is_err());
    }

    #[test]
    fn test_numeric_stats() {
        let forest = forest();
        let sample = Sample::from_rows(
            ["x", "y"],
            vec![
                vec![1.0, 0.0],
                vec![3.0, 1.0],
                vec![f64::NAN, 0.0],
                vec![4.0, f64::NAN],
                vec![9.0, 2.0],
            ],
        ).unwrap();
        let response = Response::Numeric(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let rule = RuleRenderer::new(&forest)
            .data(&sample, &response)
            .render(0, NodeId(2))
            .unwrap();
        let exp = RuleStats {
            support: 4,
            summary: ResponseSummary::Mean(Some(2.5)),
        };
        assert_eq!(Some(&exp), rule.stats());

        // Row 3 has no route at node 2.
        let rule = RuleRenderer::new(&forest)
            .data(&sample, &response)
            .render(0, NodeId(3))
            .unwrap();
        assert_eq!(rule.stats().unwrap().support, 3);
    }

    #[test]
    fn test_class_stats() {
        let forest = forest();
        let sample = Sample::from_rows(
            ["x", "y"],
            vec![vec![1.0, 0.0], vec![3.0, 1.0], vec![9.0, 2.0]],
        ).unwrap();
        let response = Response::from_labels(&["no", "yes", "yes"]);
        let rule = RuleRenderer::new(&forest)
            .data(&sample, &response)
            .render(0, NodeId(2))
            .unwrap();
        let stats = rule.stats().unwrap();
        let exp = ResponseSummary::Classes {
            labels: vec!["no".to_string(), "yes".to_string()],
            counts: vec![1, 1],
            proportions: vec![0.5, 0.5],
        };
        assert_eq!(stats.support, 2);
        assert_eq!(exp, stats.summary);
        assert_eq!(
            stats.to_string(),
            "support = 2, {no: 1 (0.500), yes: 1 (0.500)}"
        );
    }

    #[test]
    fn test_response_length_mismatch() {
        let forest = forest();
        let sample = Sample::from_rows(["x", "y"], vec![vec![1.0, 0.0]]).unwrap();
        let response = Response::Numeric(vec![1.0, 2.0]);
        let res = RuleRenderer::new(&forest)
            .data(&sample, &response)
            .render(0, NodeId(2));
        assert!(res.is_err());
    }
}

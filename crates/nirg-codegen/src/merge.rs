//! Merged groups (`spec.md` §3 `MergedGroup<T>`, §4.3 "Fusion and
//! merging").
//!
//! Merging is purely structural: groups of kind `T` are partitioned by a
//! per-pass `HashDigest`, and within each partition the lowest stable
//! index becomes the archetype. This is distinct from *fusion*
//! (`fuse.rs`), which additionally requires equal concrete *values* and
//! applies only within groups sharing a target/source population.

use std::collections::BTreeMap;

use nirg_ir::HashDigest;

/// `spec.md` §9 design note "Heterogeneous parameter detection": a
/// single generic predicate parameterised by an accessor, replacing one
/// predicate method per parameter kind. A parameter is homogeneous iff
/// `accessor` yields the same value for every member.
pub fn is_heterogeneous<T>(members: &[T], accessor: impl Fn(&T) -> f64) -> bool {
    let mut values = members.iter().map(&accessor);
    match values.next() {
        None => false,
        Some(first) => values.any(|v| v != first),
    }
}

/// One field registered on a [`MergedGroup`]: a compile-time constant
/// shared by every member when homogeneous, otherwise a per-member
/// runtime array access.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedField {
    pub name: String,
    pub homogeneous: bool,
    pub values: Vec<f64>,
}

impl MergedField {
    /// The emitted-source expansion for this field: a literal scalar
    /// constant when homogeneous (baked in at text-generation time,
    /// since every member shares it), otherwise a read through the
    /// merged group's backing array at `index_expr` — the runtime
    /// loop/thread variable selecting which member of the merged group
    /// the current kernel invocation is processing.
    pub fn expansion(&self, index_expr: &str, literal_suffix: &str) -> String {
        if self.homogeneous {
            format!("{}{literal_suffix}", format_scalar_literal(self.values[0]))
        } else {
            format!("group->{}[{index_expr}]", self.name)
        }
    }
}

fn format_scalar_literal(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

/// An ordered equivalence class of structurally-identical groups
/// (`spec.md` §3 `MergedGroup<T>`). `members` holds indices into the
/// caller's own group slice (e.g. `model.neuron_groups()`); the
/// archetype is always `members[0]`, the lowest index in the partition.
#[derive(Debug, Clone)]
pub struct MergedGroup {
    pub index: usize,
    pub members: Vec<usize>,
    fields: Vec<MergedField>,
}

impl MergedGroup {
    pub fn archetype(&self) -> usize {
        self.members[0]
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Register a field by symbolic name, computing homogeneity from
    /// `values` (one entry per member, in `self.members` order).
    /// Re-registering an already-present name is a no-op that returns
    /// the existing field, guaranteeing uniqueness by name within the
    /// merged group (`spec.md` §3).
    pub fn add_field(&mut self, name: impl Into<String>, values: Vec<f64>) -> &MergedField {
        let name = name.into();
        if let Some(pos) = self.fields.iter().position(|f| f.name == name) {
            return &self.fields[pos];
        }
        let homogeneous = !is_heterogeneous(&values, |v| *v);
        self.fields.push(MergedField { name, homogeneous, values });
        self.fields.last().unwrap()
    }

    pub fn field(&self, name: &str) -> Option<&MergedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn fields(&self) -> &[MergedField] {
        &self.fields
    }

    /// `spec.md` §8 `isParamHeterogeneous`: true iff `name` was
    /// registered and turned out heterogeneous.
    pub fn is_param_heterogeneous(&self, name: &str) -> bool {
        self.field(name).is_some_and(|f| !f.homogeneous)
    }
}

/// Gather the values `accessor` yields for each of `group`'s members,
/// reading the caller-provided `items` slice by index.
pub fn field_values<T>(group: &MergedGroup, items: &[T], accessor: impl Fn(&T) -> f64) -> Vec<f64> {
    group.members.iter().map(|&i| accessor(&items[i])).collect()
}

/// Partition `0..items.len()` into [`MergedGroup`]s by `digest_fn`
/// equality (`spec.md` §4.3). Buckets (and members within a bucket) are
/// kept in ascending index order, and the resulting groups are ordered
/// by ascending archetype index, so generation is deterministic given
/// the same model.
pub fn merge_by_digest<T>(items: &[T], digest_fn: impl Fn(&T) -> HashDigest) -> Vec<MergedGroup> {
    let mut buckets: BTreeMap<HashDigest, Vec<usize>> = BTreeMap::new();
    for (i, item) in items.iter().enumerate() {
        buckets.entry(digest_fn(item)).or_default().push(i);
    }
    let mut groups: Vec<MergedGroup> = buckets
        .into_values()
        .map(|members| MergedGroup { index: 0, members, fields: Vec::new() })
        .collect();
    groups.sort_by_key(|g| g.archetype());
    for (i, g) in groups.iter_mut().enumerate() {
        g.index = i;
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_singleton_members_are_always_homogeneous() {
        assert!(!is_heterogeneous::<f64>(&[], |v| *v));
        assert!(!is_heterogeneous(&[0.02], |v: &f64| *v));
    }

    #[test]
    fn differing_values_are_heterogeneous() {
        assert!(is_heterogeneous(&[0.02, 0.03], |v: &f64| *v));
    }

    #[test]
    fn field_registration_is_idempotent_by_name() {
        let mut group = MergedGroup { index: 0, members: vec![0, 1], fields: Vec::new() };
        group.add_field("a", vec![0.02, 0.02]);
        group.add_field("a", vec![99.0, 99.0]);
        assert_eq!(group.fields().len(), 1);
        assert_eq!(group.field("a").unwrap().values, vec![0.02, 0.02]);
    }

    #[test]
    fn heterogeneous_field_expands_to_an_indexed_array_read() {
        let mut group = MergedGroup { index: 0, members: vec![0, 1], fields: Vec::new() };
        group.add_field("aNeuron0", vec![0.02, 0.03]);
        assert!(group.is_param_heterogeneous("aNeuron0"));
        assert_eq!(group.field("aNeuron0").unwrap().expansion("g", "f"), "group->aNeuron0[g]");
    }

    #[test]
    fn homogeneous_field_expands_to_a_literal_constant() {
        let mut group = MergedGroup { index: 0, members: vec![0, 1], fields: Vec::new() };
        group.add_field("b", vec![0.2, 0.2]);
        assert!(!group.is_param_heterogeneous("b"));
        assert_eq!(group.field("b").unwrap().expansion("g", "f"), "0.2f");
    }

    #[test]
    fn merge_by_digest_partitions_and_orders_by_archetype() {
        let items = vec![10u64, 20, 10, 30];
        let groups = merge_by_digest(&items, |v| {
            let mut b = nirg_ir::DigestBuilder::new();
            b.write_u64(*v);
            b.finish()
        });
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].members, vec![0, 2]);
        assert_eq!(groups[0].archetype(), 0);
    }
}

//! Family lookups over a snapshot.
//!
//! # Invariants
//! - Queries never mutate and never fail; unknown ids yield empty results.
//! - Result ordering is deterministic.

use crate::model::person::{Person, PersonField, PersonId};
use crate::model::snapshot::TreeSnapshot;

const NAME_FIELDS: [PersonField; 3] = [
    PersonField::FirstName,
    PersonField::LastName,
    PersonField::Nickname,
];

/// Returns the person followed by every person that lists it as a parent.
///
/// Children are ordered by id.
pub fn immediate_family<'a>(snapshot: &'a TreeSnapshot, id: &PersonId) -> Vec<&'a Person> {
    let Some(person) = snapshot.get(id) else {
        return Vec::new();
    };

    let mut children = snapshot
        .persons()
        .iter()
        .filter(|candidate| candidate.relationships.parents.contains(id))
        .collect::<Vec<_>>();
    children.sort_by(|left, right| left.id.cmp(&right.id));

    let mut family = Vec::with_capacity(children.len() + 1);
    family.push(person);
    family.extend(children);
    family
}

/// Case-insensitive substring match on first, last and nick name.
///
/// Blank text matches nothing. Hits are ordered by display name, then id.
pub fn find_by_name<'a>(snapshot: &'a TreeSnapshot, text: &str) -> Vec<&'a Person> {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut hits = snapshot
        .persons()
        .iter()
        .filter(|person| {
            NAME_FIELDS.iter().any(|field| {
                person
                    .attributes
                    .get(*field)
                    .is_some_and(|value| value.to_lowercase().contains(needle.as_str()))
            })
        })
        .collect::<Vec<_>>();
    hits.sort_by(|left, right| {
        left.display_name()
            .cmp(&right.display_name())
            .then_with(|| left.id.cmp(&right.id))
    });
    hits
}

#[cfg(test)]
mod tests {
    use super::{find_by_name, immediate_family};
    use crate::model::person::PersonId;
    use crate::model::snapshot::TreeSnapshot;

    fn ids(persons: &[&crate::model::person::Person]) -> Vec<String> {
        persons.iter().map(|person| person.id.to_string()).collect()
    }

    #[test]
    fn immediate_family_lists_person_then_children() {
        let snapshot = TreeSnapshot::bundled_default();
        let family = immediate_family(&snapshot, &PersonId::new("3"));
        assert_eq!(ids(&family), vec!["3", "10", "11"]);
    }

    #[test]
    fn immediate_family_of_unknown_id_is_empty() {
        let snapshot = TreeSnapshot::bundled_default();
        assert!(immediate_family(&snapshot, &PersonId::new("ghost")).is_empty());
    }

    #[test]
    fn find_by_name_is_case_insensitive_and_covers_nick_name() {
        let snapshot = TreeSnapshot::bundled_default();
        assert_eq!(ids(&find_by_name(&snapshot, "ARJUN")), vec!["10"]);
        assert_eq!(ids(&find_by_name(&snapshot, "amma")), vec!["2"]);
        assert!(find_by_name(&snapshot, "   ").is_empty());
    }

    #[test]
    fn find_by_name_orders_hits_by_display_name() {
        let snapshot = TreeSnapshot::bundled_default();
        let hits = find_by_name(&snapshot, "joshi");
        let names = hits
            .iter()
            .map(|person| person.display_name())
            .collect::<Vec<_>>();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(names.contains(&"Meera Joshi".to_string()));
        assert!(names.contains(&"Anil Joshi".to_string()));
    }
}

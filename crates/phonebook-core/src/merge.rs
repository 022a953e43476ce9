//! Pure list operations: sort, filter, and id deduplication.
//!
//! Nothing here performs I/O; the sync engine and view-model feed every list
//! they expose through [`merge_view`].

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{
    Contact, ContactEntry, ContactRef, PendingContact, PendingStatus, Preferences, SortField,
    SortOrder,
};

/// Case-insensitive comparison of two field values.
///
/// Accented Latin letters sort with their base letter; only when the folded
/// keys tie does the accent decide ("e" before "é").
fn compare_text(left: &str, right: &str) -> Ordering {
    collation_key(left)
        .cmp(&collation_key(right))
        .then_with(|| left.to_lowercase().cmp(&right.to_lowercase()))
}

fn collation_key(value: &str) -> String {
    value.chars().flat_map(char::to_lowercase).map(base_letter).collect()
}

/// Base letter of a lowercase Latin-1 or Latin Extended-A letter.
const fn base_letter(letter: char) -> char {
    match letter {
        'à'..='å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => 'c',
        'ď' | 'đ' => 'd',
        'è'..='ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => 'g',
        'ĥ' | 'ħ' => 'h',
        'ì'..='ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => 'i',
        'ĵ' => 'j',
        'ķ' => 'k',
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => 'l',
        'ñ' | 'ń' | 'ņ' | 'ň' => 'n',
        'ò'..='ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => 'o',
        'ŕ' | 'ŗ' | 'ř' => 'r',
        'ś' | 'ŝ' | 'ş' | 'š' => 's',
        'ţ' | 'ť' | 'ŧ' => 't',
        'ù'..='ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => 'u',
        'ŵ' => 'w',
        'ý' | 'ÿ' | 'ŷ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        other => other,
    }
}

/// Stable sort on the stringified `field` value.
///
/// `Desc` flips the comparator rather than reversing the output, so ties keep
/// their input order in both directions.
pub fn sort_contacts(
    mut items: Vec<ContactEntry>,
    field: &SortField,
    order: SortOrder,
) -> Vec<ContactEntry> {
    items.sort_by(|left, right| {
        let ordering = compare_text(&left.field_value(field), &right.field_value(field));
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    items
}

/// Keep entries whose name or phone contains `term`, ignoring case.
pub fn filter_contacts(items: Vec<ContactEntry>, term: &str) -> Vec<ContactEntry> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| matches_term(item, &needle))
        .collect()
}

/// Whether `item` matches an already lowercased search needle.
fn matches_term(item: &ContactEntry, needle: &str) -> bool {
    item.name().to_lowercase().contains(needle) || item.phone().to_lowercase().contains(needle)
}

/// Whether `item` would survive `filter_contacts` for the given preferences.
pub fn matches_search(item: &ContactEntry, prefs: &Preferences) -> bool {
    prefs
        .search_term()
        .map_or(true, |term| matches_term(item, &term.to_lowercase()))
}

/// Whether `incoming` should replace `current` for the same id.
fn supersedes(current: &ContactEntry, incoming: &ContactEntry) -> bool {
    match (current, incoming) {
        (ContactEntry::Synced(_), _) => true,
        (ContactEntry::Pending(_), ContactEntry::Synced(_)) => false,
        (ContactEntry::Pending(current), ContactEntry::Pending(incoming)) => {
            incoming.queued_at >= current.queued_at
        }
    }
}

/// Collapse entries sharing an id, then sort.
///
/// Pending entries beat synced ones; among pending entries the most recently
/// queued wins; among synced entries the later one (fresher page) wins.
pub fn deduplicate_by_id(
    items: Vec<ContactEntry>,
    field: &SortField,
    order: SortOrder,
) -> Vec<ContactEntry> {
    let mut positions: HashMap<ContactRef, usize> = HashMap::with_capacity(items.len());
    let mut unique: Vec<ContactEntry> = Vec::with_capacity(items.len());

    for item in items {
        let id = item.id();
        match positions.get(&id) {
            Some(&index) => {
                if supersedes(&unique[index], &item) {
                    unique[index] = item;
                }
            }
            None => {
                positions.insert(id, unique.len());
                unique.push(item);
            }
        }
    }

    sort_contacts(unique, field, order)
}

/// Visible list for `prefs`: pending entries merged over server contacts.
///
/// Dedup runs before the filter so a pending edit that stops matching hides
/// the stale server copy too. Queued deletes are dropped from the result.
pub fn merge_view(
    pending: &[PendingContact],
    contacts: impl IntoIterator<Item = ContactEntry>,
    prefs: &Preferences,
) -> Vec<ContactEntry> {
    let combined = pending
        .iter()
        .cloned()
        .map(ContactEntry::Pending)
        .chain(contacts)
        .collect::<Vec<_>>();

    let unique = deduplicate_by_id(combined, &prefs.sort_by, prefs.sort_order);
    filter_contacts(unique, &prefs.search)
        .into_iter()
        .filter(|item| item.pending_status() != Some(PendingStatus::Deleted))
        .collect()
}

/// Wrap server contacts as synced entries.
pub fn synced(contacts: impl IntoIterator<Item = Contact>) -> Vec<ContactEntry> {
    contacts.into_iter().map(ContactEntry::Synced).collect()
}

use serde_json::{Map, Value};
use tracing::info;

use hearth_db::{Document, DocumentStore};
use hearth_types::{Collection, NewRule, Rule, RulePatch, Timestamp};

use super::{Household, Result, list_decoded, new_id, require_text};
use crate::defaults;
use crate::hub::Subscription;

/// Rules ascending by `order`; ties keep storage order.
fn rules_snapshot(store: &dyn DocumentStore) -> Vec<Rule> {
    let mut rules: Vec<Rule> = list_decoded(store, Collection::Rules);
    rules.sort_by_key(|r| r.order);
    rules
}

/// One past the highest stored order, or 1 for no rules. A failed read is an
/// error here, unlike on the snapshot path.
fn next_order(store: &dyn DocumentStore) -> Result<i64> {
    let max = store
        .list(Collection::Rules)?
        .iter()
        .filter_map(|doc| doc.body.get("order").and_then(Value::as_i64))
        .max();
    Ok(max.map_or(1, |max| max + 1))
}

fn insert_rule(store: &dyn DocumentStore, new: NewRule) -> Result<Rule> {
    let now = Timestamp::now();
    let rule = Rule {
        id: new_id(),
        content: new.content,
        order: new.order,
        title: new.title,
        is_new: new.is_new,
        created_at: now,
        updated_at: now,
    };
    store.put(Collection::Rules, Document::from_entity(&rule.id, &rule)?)?;
    Ok(rule)
}

impl Household {
    // -- Rules --

    pub async fn rules(&self) -> Vec<Rule> {
        self.read(|store| Ok(rules_snapshot(store)))
            .await
            .unwrap_or_default()
    }

    /// Persist a rule with an explicit order. Returns its id.
    pub async fn add_rule(&self, new: NewRule) -> Result<String> {
        require_text(&new.content, "content")?;
        let rule = self
            .commit(Collection::Rules, move |store| Ok((insert_rule(store, new)?, true)))
            .await?;
        info!("Rule added with id {}", rule.id);
        Ok(rule.id)
    }

    /// Create a rule ordered after every existing rule.
    pub async fn create_rule(
        &self,
        content: String,
        title: Option<String>,
        is_new: bool,
    ) -> Result<Rule> {
        require_text(&content, "content")?;
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let rule = self
            .commit(Collection::Rules, move |store| {
                let order = next_order(store)?;
                let rule = insert_rule(store, NewRule { content, order, title, is_new })?;
                Ok((rule, true))
            })
            .await?;
        info!("Rule {} created at order {}", rule.id, rule.order);
        Ok(rule)
    }

    /// Apply `patch` and refresh `updatedAt`.
    pub async fn update_rule(&self, id: &str, patch: RulePatch) -> Result<()> {
        if let Some(content) = &patch.content {
            require_text(content, "content")?;
        }

        let mut fields: Map<String, Value> = match serde_json::to_value(&patch)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        fields.insert("updatedAt".into(), serde_json::to_value(Timestamp::now())?);

        let id = id.to_string();
        self.commit(Collection::Rules, move |store| {
            let changed = store.update(Collection::Rules, &id, fields)?;
            Ok(((), changed))
        })
        .await
    }

    pub async fn delete_rule(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.commit(Collection::Rules, move |store| {
            let removed = store.delete(Collection::Rules, &id)?;
            Ok(((), removed))
        })
        .await
    }

    pub async fn subscribe_rules<F>(&self, callback: F) -> Result<Subscription>
    where
        F: FnMut(Vec<Rule>) + Send + 'static,
    {
        self.subscribe_with(Collection::Rules, rules_snapshot, callback)
            .await
    }

    /// Seed the default house rules into an empty collection.
    /// Returns whether anything was seeded.
    pub async fn initialize_default_rules(&self) -> Result<bool> {
        let seeded = self
            .commit(Collection::Rules, |store| {
                if !store.list(Collection::Rules)?.is_empty() {
                    return Ok((false, false));
                }
                for (title, content, order) in defaults::default_rules() {
                    insert_rule(
                        store,
                        NewRule {
                            content: content.to_string(),
                            order,
                            title: Some(title.to_string()),
                            is_new: false,
                        },
                    )?;
                }
                Ok((true, true))
            })
            .await?;

        if seeded {
            info!("Default rules initialized");
        } else {
            info!("Rules already exist, skipping initialization");
        }
        Ok(seeded)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use hearth_db::StoreError;

    use super::*;
    use crate::error::{Declined, HouseError};
    use crate::household::test_support::{broken_household, durable, local};

    fn new_rule(content: &str, order: i64) -> NewRule {
        NewRule {
            content: content.into(),
            order,
            title: None,
            is_new: false,
        }
    }

    #[tokio::test]
    async fn test_rules_sorted_by_order() {
        let house = local();
        house.add_rule(new_rule("third", 30)).await.unwrap();
        house.add_rule(new_rule("first", 1)).await.unwrap();
        house.add_rule(new_rule("second", 7)).await.unwrap();

        let contents: Vec<_> = house.rules().await.into_iter().map(|r| r.content).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_create_rule_orders_after_max() {
        let house = local();
        assert_eq!(house.create_rule("a".into(), None, false).await.unwrap().order, 1);
        house.add_rule(new_rule("b", 10)).await.unwrap();
        let rule = house
            .create_rule("c".into(), Some("  ".into()), true)
            .await
            .unwrap();
        assert_eq!(rule.order, 11);
        assert_eq!(rule.title, None);
        assert!(rule.is_new);
    }

    #[tokio::test]
    async fn test_empty_content_declined() {
        let house = local();
        let err = house.add_rule(new_rule("   ", 1)).await.unwrap_err();
        assert_eq!(err.declined(), Some(&Declined::EmptyField("content")));
        assert!(house.rules().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_rule_patch() {
        let house = local();
        let rule = house
            .create_rule("old".into(), Some("Title".into()), true)
            .await
            .unwrap();

        house
            .update_rule(
                &rule.id,
                RulePatch {
                    content: Some("new".into()),
                    title: Some(None),
                    is_new: None,
                },
            )
            .await
            .unwrap();

        let updated = &house.rules().await[0];
        assert_eq!(updated.content, "new");
        assert_eq!(updated.title, None);
        assert!(updated.is_new);
        assert_eq!(updated.created_at, rule.created_at);
        assert!(updated.updated_at >= rule.updated_at);
    }

    #[tokio::test]
    async fn test_update_missing_rule_depends_on_mode() {
        let patch = RulePatch {
            is_new: Some(false),
            ..Default::default()
        };

        local().update_rule("ghost", patch.clone()).await.unwrap();

        let err = durable().update_rule("ghost", patch).await.unwrap_err();
        assert!(matches!(err, HouseError::Store(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_rule_is_idempotent() {
        let house = local();
        let id = house.add_rule(new_rule("x", 1)).await.unwrap();
        house.delete_rule(&id).await.unwrap();
        house.delete_rule(&id).await.unwrap();
        assert!(house.rules().await.is_empty());
    }

    #[tokio::test]
    async fn test_subscriber_sees_add_before_it_resolves() {
        let house = durable();
        let seen: Arc<Mutex<Vec<Vec<Rule>>>> = Arc::default();
        let sink = seen.clone();
        let _sub = house
            .subscribe_rules(move |rules| sink.lock().unwrap().push(rules))
            .await
            .unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(seen.lock().unwrap()[0].is_empty());

        let id = house.add_rule(new_rule("quiet hours", 1)).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].iter().any(|r| r.id == id));
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_callbacks() {
        let house = local();
        let calls = Arc::new(Mutex::new(0usize));
        let counter = calls.clone();
        let sub = house
            .subscribe_rules(move |_| *counter.lock().unwrap() += 1)
            .await
            .unwrap();
        sub.unsubscribe();

        house.add_rule(new_rule("x", 1)).await.unwrap();
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_initialize_default_rules_once() {
        let house = local();
        assert!(house.initialize_default_rules().await.unwrap());
        assert!(!house.initialize_default_rules().await.unwrap());

        let rules = house.rules().await;
        assert_eq!(rules.len(), 7);
        assert_eq!(rules[0].order, 1);
        assert_eq!(rules[1].display_title(2), "2. الضيوف");
    }

    #[tokio::test]
    async fn test_failed_reads_degrade_to_empty() {
        let house = broken_household();
        assert!(house.rules().await.is_empty());

        let seen: Arc<Mutex<Vec<usize>>> = Arc::default();
        let sink = seen.clone();
        let _sub = house
            .subscribe_rules(move |rules| sink.lock().unwrap().push(rules.len()))
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn test_create_rule_propagates_failed_read() {
        let house = broken_household();
        let err = house.create_rule("content".into(), None, false).await.unwrap_err();
        assert!(matches!(err, HouseError::Store(StoreError::LockPoisoned(_))));
    }
}

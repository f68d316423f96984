use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use hearth_core::format_rule;
use hearth_types::api::{Claims, CreateRuleRequest, RuleView};
use hearth_types::{Rule, RulePatch};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::require_admin;

/// Attach rank, resolved title and rendered content to rules already in
/// display order.
pub fn rule_views(rules: Vec<Rule>) -> Vec<RuleView> {
    rules
        .into_iter()
        .enumerate()
        .map(|(i, rule)| {
            let rank = i + 1;
            RuleView {
                display_title: rule.display_title(rank),
                html: format_rule(rule.content.as_str()).to_html(),
                rank,
                rule,
            }
        })
        .collect()
}

pub async fn list_rules(State(state): State<AppState>) -> impl IntoResponse {
    Json(rule_views(state.household.rules().await))
}

pub async fn create_rule(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateRuleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&claims)?;

    let rule = state
        .household
        .create_rule(req.content, req.title, req.is_new)
        .await?;

    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn update_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(patch): Json<RulePatch>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&claims)?;
    state.household.update_rule(&rule_id, patch).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&claims)?;
    state.household.delete_rule(&rule_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Seed the default rules. Does nothing if any rule exists.
pub async fn seed_defaults(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&claims)?;
    let seeded = state.household.initialize_default_rules().await?;
    Ok(Json(serde_json::json!({ "seeded": seeded })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_types::Timestamp;

    fn rule(id: &str, content: &str, title: Option<&str>) -> Rule {
        Rule {
            id: id.into(),
            content: content.into(),
            order: 1,
            title: title.map(Into::into),
            is_new: false,
            created_at: Timestamp::now(),
            updated_at: Timestamp::now(),
        }
    }

    #[test]
    fn test_rule_views_rank_and_render() {
        let views = rule_views(vec![
            rule("a", "- **Quiet** hours\n- Shoes off", None),
            rule("b", "Plain", Some("Kitchen")),
        ]);

        assert_eq!(views[0].rank, 1);
        assert!(views[0].html.contains("<strong>Quiet</strong>"));
        assert_eq!(views[1].rank, 2);
        assert_eq!(views[1].display_title, "Kitchen");

        let json = serde_json::to_value(&views[1]).unwrap();
        assert_eq!(json["id"], "b");
        assert_eq!(json["displayTitle"], "Kitchen");
    }
}

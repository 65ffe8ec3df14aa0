//! Category model with parent/child hierarchy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub is_visible: bool,
    pub is_featured: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub is_visible: bool,
    pub is_featured: bool,
    pub sort_order: i32,
}

/// Partial update. `parent_id: Some(None)` detaches from the parent.
#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<Option<Uuid>>,
    pub is_visible: Option<bool>,
    pub is_featured: Option<bool>,
    pub sort_order: Option<i32>,
}

/// Category with nested children.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

/// Nest a flat list into a forest. Input order is preserved among siblings;
/// categories whose parent is absent from the list become roots.
pub fn build_category_tree(categories: Vec<Category>) -> Vec<CategoryNode> {
    let present: std::collections::HashSet<Uuid> = categories.iter().map(|c| c.id).collect();
    let mut children_of: HashMap<Option<Uuid>, Vec<Category>> = HashMap::new();

    for category in categories {
        let key = category.parent_id.filter(|p| present.contains(p));
        children_of.entry(key).or_default().push(category);
    }

    fn attach(
        parent: Option<Uuid>,
        children_of: &mut HashMap<Option<Uuid>, Vec<Category>>,
    ) -> Vec<CategoryNode> {
        let Some(level) = children_of.remove(&parent) else {
            return Vec::new();
        };
        level
            .into_iter()
            .map(|category| {
                let children = attach(Some(category.id), children_of);
                CategoryNode { category, children }
            })
            .collect()
    }

    attach(None, &mut children_of)
}

/// Public tree: hidden categories are dropped together with every
/// descendant, visible or not.
pub fn visible_category_tree(categories: Vec<Category>) -> Vec<CategoryNode> {
    fn prune(nodes: Vec<CategoryNode>) -> Vec<CategoryNode> {
        nodes
            .into_iter()
            .filter(|node| node.category.is_visible)
            .map(|node| CategoryNode {
                children: prune(node.children),
                category: node.category,
            })
            .collect()
    }

    prune(build_category_tree(categories))
}

/// Would setting `parent_id` of `id` to `new_parent` create a cycle?
///
/// `parents` maps every category to its current parent. The walk is bounded
/// by the number of categories so corrupt data cannot loop forever.
pub fn would_create_cycle(
    parents: &HashMap<Uuid, Option<Uuid>>,
    id: Uuid,
    new_parent: Option<Uuid>,
) -> bool {
    let mut cursor = new_parent;
    let mut steps = 0usize;

    while let Some(current) = cursor {
        if current == id {
            return true;
        }
        steps += 1;
        if steps > parents.len() {
            return true;
        }
        cursor = parents.get(&current).copied().flatten();
    }

    false
}

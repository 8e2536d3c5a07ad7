use crate::ids::IdSupplier;
use crate::models::{Step, StepEvidence, Subtask, UserId};

/// Name given to generated subtasks when the task has no name templates.
pub const DEFAULT_SUBTASK_NAME: &str = "Subtask";

/// Copies step templates under fresh IDs with all completion evidence cleared.
pub fn clone_step_templates(templates: &[Step], ids: &mut dyn IdSupplier) -> Vec<Step> {
    templates
        .iter()
        .map(|s| Step { id: ids.new_id(), name: s.name.clone(), evidence: StepEvidence::None })
        .collect()
}

/// Expands a composite task's templates into one subtask per (user, name)
/// pair, users outermost.
pub fn generate_subtasks(
    user_ids: &[UserId],
    step_templates: &[Step],
    name_templates: &[String],
    ids: &mut dyn IdSupplier,
) -> Vec<Subtask> {
    let default_names = [DEFAULT_SUBTASK_NAME.to_string()];
    let names = if name_templates.is_empty() { &default_names[..] } else { name_templates };

    let mut list = Vec::with_capacity(user_ids.len() * names.len());
    for uid in user_ids {
        for name in names {
            list.push(Subtask {
                id: ids.new_id(),
                name: name.clone(),
                owner_user_id: uid.clone(),
                steps: clone_step_templates(step_templates, ids),
                completed: false,
                completed_at: None,
                note: None,
            });
        }
    }
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;
    use crate::models::DONE_SENTINEL;

    fn users(ids: &[&str]) -> Vec<UserId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn one_subtask_per_user_and_name_in_order() {
        let mut ids = SequentialIds::new("g");
        let steps = vec![Step::new("s1".into(), "Step1")];
        let names = vec!["Design".to_string(), "Build".to_string()];
        let subtasks = generate_subtasks(&users(&["a", "b"]), &steps, &names, &mut ids);

        let pairs: Vec<(&str, &str)> =
            subtasks.iter().map(|st| (st.owner_user_id.as_str(), st.name.as_str())).collect();
        assert_eq!(pairs, vec![("a", "Design"), ("a", "Build"), ("b", "Design"), ("b", "Build")]);
        assert!(subtasks.iter().all(|st| st.steps.len() == 1 && !st.completed));
    }

    #[test]
    fn default_name_when_no_templates() {
        let mut ids = SequentialIds::new("g");
        let subtasks = generate_subtasks(&users(&["a"]), &[], &[], &mut ids);
        assert_eq!(subtasks.len(), 1);
        assert_eq!(subtasks[0].name, DEFAULT_SUBTASK_NAME);
        assert!(subtasks[0].steps.is_empty());
    }

    #[test]
    fn cloned_steps_get_fresh_ids_and_no_evidence() {
        let mut ids = SequentialIds::new("g");
        let mut template = Step::new("tpl".into(), "Step1");
        template.evidence =
            StepEvidence::Single { done_by: DONE_SENTINEL.into(), completed_at: None };
        let subtasks = generate_subtasks(&users(&["a", "b"]), &[template], &[], &mut ids);

        let step_ids: Vec<&str> =
            subtasks.iter().flat_map(|st| st.steps.iter().map(|s| s.id.as_str())).collect();
        assert_eq!(step_ids.len(), 2);
        assert_ne!(step_ids[0], step_ids[1]);
        assert!(step_ids.iter().all(|id| *id != "tpl"));
        assert!(subtasks.iter().flat_map(|st| &st.steps).all(|s| !s.is_done()));
    }
}

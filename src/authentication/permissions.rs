use crate::{jwt::SessionData, schema::UserRole};

const USER_ACTIONS: &[ActionType] = &[
    ActionType::CreateRecipes,
    ActionType::ManageOwnRecipes,
    ActionType::ManageOwnFavorites,
    ActionType::ManageOwnSubscriptions,
];

const ADMIN_ACTIONS: &[ActionType] = &[
    ActionType::CreateRecipes,
    ActionType::ManageOwnRecipes,
    ActionType::ManageOwnFavorites,
    ActionType::ManageOwnSubscriptions,
    ActionType::ManageAllRecipes,
    ActionType::ManageCatalog,
];

const ACTION_TABLE: &[(UserRole, &[ActionType])] =
    &[(UserRole::User, USER_ACTIONS), (UserRole::Admin, ADMIN_ACTIONS)];

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnRecipes,
    ManageOwnFavorites,
    ManageOwnSubscriptions,

    ManageAllRecipes,
    ManageCatalog,
}

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        // staff and superusers act as admins whatever their stored role
        let role = if session.is_admin {
            UserRole::Admin
        } else {
            session.role
        };

        ACTION_TABLE
            .iter()
            .find(|(uid, _)| *uid == role)
            .map(|(_, actions)| actions.contains(&self))
            .unwrap_or(false)
    }
}

mod catalog;
mod helpers;
mod ingredient;
mod recipe;
mod shopping;
mod storage;

pub(crate) use catalog::{cmd_catalog_add, cmd_catalog_list, cmd_catalog_update};
pub(crate) use ingredient::{cmd_ingredient_list, cmd_ingredient_resolve};
pub(crate) use recipe::{
    cmd_recipe_create, cmd_recipe_delete, cmd_recipe_import, cmd_recipe_list, cmd_recipe_show,
};
pub(crate) use shopping::{
    cmd_shopping_add, cmd_shopping_add_recipe, cmd_shopping_check, cmd_shopping_create,
    cmd_shopping_delete, cmd_shopping_list, cmd_shopping_remove, cmd_shopping_show,
};
pub(crate) use storage::{
    cmd_storage_create, cmd_storage_delete, cmd_storage_list, cmd_storage_move,
    cmd_storage_remove, cmd_storage_set_quantity, cmd_storage_show, cmd_storage_store,
};

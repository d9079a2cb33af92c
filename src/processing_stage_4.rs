/* Stage 4. Assign addresses and sizes along the final order.
 *
 * Images in front of the application are packed from the start of flash. Images behind it are
 * packed against the end of flash, so the image placed last ends exactly at the flash size. The
 * application takes the gap in between.
 */

use log::info;
use vec_map::VecDict;

use crate::errors::LayoutError;
use crate::misc::ImageToken;
use crate::processing_stage_1::ImageRegistry;
use crate::processing_stage_3::solve_order;

fn resolve_sizes(
    registry: &ImageRegistry,
    order: &[ImageToken],
    flash_size: u64,
) -> Result<VecDict<ImageToken, u64>, LayoutError> {
    let app = registry.app();
    let mut sizes = VecDict::new(registry.len());
    let mut total: u64 = 0;

    for token in order.iter().filter(|token| **token != app) {
        let size = registry.resolve_size(*token)?;
        total = total.saturating_add(size);
        sizes.insert(token, size);
    }

    if total > flash_size {
        return Err(LayoutError::ImagesTooLarge { total, flash_size });
    }

    Ok(sizes)
}

/// Writes `address` and `size` of every image of `order` into the registry. `order` must hold
/// every image of the registry exactly once.
pub fn assign_addresses(
    registry: &mut ImageRegistry,
    order: &[ImageToken],
    flash_size: u64,
) -> Result<(), LayoutError> {
    let app = registry.app();

    let mut seen = VecDict::<ImageToken, ()>::new(registry.len());
    for token in order {
        if seen.insert(token, ()).is_some() {
            return Err(LayoutError::IncompleteOrder);
        }
    }
    if order.len() != registry.len() || registry.tokens().any(|token| !seen.contains_key(&token)) {
        return Err(LayoutError::IncompleteOrder);
    }

    let app_index = order
        .iter()
        .position(|token| *token == app)
        .ok_or(LayoutError::IncompleteOrder)?;

    let sizes = resolve_sizes(registry, order, flash_size)?;
    let negative = |token: &ImageToken| LayoutError::NegativeSize(registry[token].name.clone());

    let mut placed: Vec<(ImageToken, u64, u64)> = Vec::with_capacity(order.len());

    let mut address: u64 = 0;
    for token in &order[..app_index] {
        let size = sizes[token];
        placed.push((*token, address, size));
        address = address.checked_add(size).ok_or_else(|| negative(token))?;
    }
    let app_address = address;

    let mut end = flash_size;
    for token in order[app_index + 1..].iter().rev() {
        let size = sizes[token];
        end = end.checked_sub(size).ok_or_else(|| negative(token))?;
        placed.push((*token, end, size));
    }

    let app_size = end
        .checked_sub(app_address)
        .ok_or_else(|| negative(&app))?;
    placed.push((app, app_address, app_size));

    for (token, address, size) in placed {
        let image = &mut registry[&token];
        image.address = Some(address);
        image.size = Some(size);
    }

    Ok(())
}

/// Orders the images and assigns their addresses. Returns the final order.
pub fn resolve(
    registry: &mut ImageRegistry,
    flash_size: u64,
) -> Result<Vec<ImageToken>, LayoutError> {
    let order = solve_order(registry)?;
    assign_addresses(registry, &order, flash_size)?;

    info!("{:<24} {:>12} {:>12}", "image", "address", "size");
    for token in &order {
        let image = &registry[token];
        info!(
            "{:<24} {:>#12x} {:>#12x}",
            image.name,
            image.address.unwrap_or_default(),
            image.size.unwrap_or_default()
        );
    }

    Ok(order)
}

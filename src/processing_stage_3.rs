/* Stage 3. Find an order of images in which every image sits exactly where its placement says.
 *
 * The working order starts as the declaration order with the application image appended. Then
 * repair passes are run until the order is valid: every image that is not where its placement
 * implies is moved directly next to its target (the images in between shift by one). An image
 * only has to move again once its target moves, so for satisfiable constraints the number of
 * passes is bounded by the length of the longest chain of targets. Conflicting constraints keep
 * pushing images around forever; they are detected by the pass limit.
 */

use log::debug;
use vec_map::VecDict;

use crate::errors::LayoutError;
use crate::misc::ImageToken;
use crate::processing_stage_1::ImageRegistry;
use crate::schemes::{Direction, Placement};

/// Placement of an image once its candidates are matched against the working order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Before(ImageToken),
    After(ImageToken),
    Last,
    Free,
}

type Positions = VecDict<ImageToken, usize>;

fn positions(registry: &ImageRegistry, order: &[ImageToken]) -> Positions {
    let mut positions = Positions::new(registry.len());
    for (index, token) in order.iter().enumerate() {
        positions.insert(token, index);
    }
    positions
}

fn rule(
    registry: &ImageRegistry,
    positions: &Positions,
    token: ImageToken,
) -> Result<Rule, LayoutError> {
    let image = &registry[&token];

    let (direction, candidates) = match &image.placement {
        Placement::Last => return Ok(Rule::Last),
        Placement::Unconstrained => return Ok(Rule::Free),
        Placement::Adjacent {
            direction,
            candidates,
        } => (direction, candidates),
    };

    let target = candidates
        .iter()
        .filter_map(|name| registry.token(name))
        .find(|candidate| positions.contains_key(candidate))
        .ok_or_else(|| LayoutError::DanglingCandidates {
            image: image.name.clone(),
            candidates: candidates.clone(),
        })?;

    if target == token {
        return Err(LayoutError::SelfReference(image.name.clone()));
    }

    Ok(match direction {
        Direction::Before => Rule::Before(target),
        Direction::After => Rule::After(target),
    })
}

/// Index the rule puts the image at, `None` when it would fall outside the order.
fn implied_index(rule: Rule, current: usize, positions: &Positions, len: usize) -> Option<usize> {
    match rule {
        Rule::Before(target) => positions[&target].checked_sub(1),
        Rule::After(target) => Some(positions[&target] + 1).filter(|index| *index < len),
        Rule::Last => len.checked_sub(1),
        Rule::Free => Some(current),
    }
}

fn is_permutation(registry: &ImageRegistry, order: &[ImageToken], positions: &Positions) -> bool {
    order.len() == registry.len() && registry.tokens().all(|token| positions.contains_key(&token))
}

/// Checks whether every image of `order` is exactly where its placement implies. An image whose
/// candidates are all missing from the order is an error, not merely an invalid order.
pub fn valid_solution(registry: &ImageRegistry, order: &[ImageToken]) -> Result<bool, LayoutError> {
    let positions = positions(registry, order);

    if !is_permutation(registry, order, &positions) {
        return Ok(false);
    }

    for (index, token) in order.iter().enumerate() {
        let rule = rule(registry, &positions, *token)?;
        if implied_index(rule, index, &positions, order.len()) != Some(index) {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Drops candidates that are not part of the order. Every image must keep at least one.
pub fn narrow_candidates(
    registry: &mut ImageRegistry,
    order: &[ImageToken],
) -> Result<(), LayoutError> {
    let present = positions(registry, order);

    let known: Vec<(ImageToken, Vec<String>)> = order
        .iter()
        .filter_map(|token| match &registry[token].placement {
            Placement::Adjacent { candidates, .. } => {
                let kept = candidates
                    .iter()
                    .filter(|name| {
                        registry
                            .token(name)
                            .map_or(false, |candidate| present.contains_key(&candidate))
                    })
                    .cloned()
                    .collect();
                Some((*token, kept))
            }
            _ => None,
        })
        .collect();

    for (token, kept) in known {
        let image = &mut registry[&token];

        if let Placement::Adjacent { candidates, .. } = &mut image.placement {
            if kept.is_empty() {
                return Err(LayoutError::DanglingCandidates {
                    image: image.name.clone(),
                    candidates: candidates.clone(),
                });
            }
            *candidates = kept;
        }
    }

    Ok(())
}

fn check_single_last(registry: &ImageRegistry) -> Result<(), LayoutError> {
    let mut last = registry
        .images()
        .filter(|image| image.placement == Placement::Last);

    match (last.next(), last.next()) {
        (Some(first), Some(second)) => Err(LayoutError::MultipleLast {
            first: first.name.clone(),
            second: second.name.clone(),
        }),
        _ => Ok(()),
    }
}

/* Moves the image at `from` to the index its rule implies, next to its target. */
fn move_image(order: &mut Vec<ImageToken>, from: usize, rule: Rule, positions: &Positions) {
    let to = match rule {
        Rule::Before(target) if positions[&target] > from => positions[&target] - 1,
        Rule::Before(target) => positions[&target],
        Rule::After(target) if positions[&target] > from => positions[&target],
        Rule::After(target) => positions[&target] + 1,
        Rule::Last => order.len() - 1,
        Rule::Free => from,
    };

    let token = order.remove(from);
    order.insert(to, token);
}

fn repair_pass(
    registry: &ImageRegistry,
    order: &mut Vec<ImageToken>,
) -> Result<usize, LayoutError> {
    let mut moved = 0;

    for token in order.clone() {
        let positions = positions(registry, order);
        let current = positions[&token];
        let rule = rule(registry, &positions, token)?;

        if implied_index(rule, current, &positions, order.len()) != Some(current) {
            move_image(order, current, rule, &positions);
            moved += 1;
        }
    }

    Ok(moved)
}

pub fn max_passes(image_count: usize) -> usize {
    2 * image_count + 2
}

/// Computes an order satisfying every placement of the registry. Candidate lists of the
/// registry are narrowed to the images that exist.
pub fn solve_order(registry: &mut ImageRegistry) -> Result<Vec<ImageToken>, LayoutError> {
    check_single_last(registry)?;

    let app = registry.app();
    let mut order: Vec<ImageToken> = registry
        .tokens()
        .filter(|token| *token != app)
        .chain(std::iter::once(app))
        .collect();

    narrow_candidates(registry, &order)?;

    let passes = max_passes(order.len());
    for pass in 0..passes {
        if valid_solution(registry, &order)? {
            debug!("placement converged after {} passes", pass);
            return Ok(order);
        }

        let moved = repair_pass(registry, &mut order)?;
        debug!("pass {}: moved {} images", pass + 1, moved);
    }

    if valid_solution(registry, &order)? {
        return Ok(order);
    }

    Err(LayoutError::NoConvergence { passes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing_stage_1::Image;
    use crate::schemes::Placement;

    fn registry(images: &[(&str, Placement)]) -> ImageRegistry {
        ImageRegistry::with_images(
            images
                .iter()
                .map(|(name, placement)| Image::new(name, placement.clone(), Some(100))),
        )
        .unwrap()
    }

    fn names(registry: &ImageRegistry, order: &[ImageToken]) -> Vec<String> {
        order
            .iter()
            .map(|token| registry[token].name.clone())
            .collect()
    }

    fn tokens(registry: &ImageRegistry, names: &[&str]) -> Vec<ImageToken> {
        names
            .iter()
            .map(|name| registry.token(name).unwrap())
            .collect()
    }

    #[test]
    fn chain_of_befores() {
        let mut registry = registry(&[
            ("e", Placement::before(&["app"])),
            ("a", Placement::before(&["b"])),
            ("d", Placement::before(&["e"])),
            ("c", Placement::before(&["d"])),
            ("b", Placement::before(&["c"])),
        ]);

        let order = solve_order(&mut registry).unwrap();

        assert_eq!(names(&registry, &order), ["a", "b", "c", "d", "e", "app"]);
        assert!(valid_solution(&registry, &order).unwrap());
    }

    #[test]
    fn chains_on_both_sides_of_app() {
        let mut registry = registry(&[
            ("e", Placement::before(&["app"])),
            ("a", Placement::before(&["b"])),
            ("d", Placement::before(&["e"])),
            ("c", Placement::before(&["d"])),
            ("h", Placement::Last),
            ("f", Placement::before(&["g"])),
            ("g", Placement::before(&["h"])),
            ("b", Placement::before(&["c"])),
        ]);

        let order = solve_order(&mut registry).unwrap();

        assert_eq!(
            names(&registry, &order),
            ["a", "b", "c", "d", "e", "app", "f", "g", "h"]
        );
    }

    #[test]
    fn first_present_candidate_is_used() {
        let mut registry = registry(&[
            ("provision", Placement::Last),
            ("mcuboot", Placement::before(&["spu", "app"])),
            ("b0", Placement::before(&["mcuboot", "app"])),
            ("spu", Placement::before(&["app"])),
        ]);

        let order = solve_order(&mut registry).unwrap();

        assert_eq!(
            names(&registry, &order),
            ["b0", "mcuboot", "spu", "app", "provision"]
        );
    }

    #[test]
    fn absent_candidates_are_narrowed_away() {
        let mut registry = registry(&[
            ("mcuboot", Placement::before(&["app", "spu"])),
            ("b0", Placement::before(&["mcuboot", "app"])),
        ]);

        let order = solve_order(&mut registry).unwrap();

        assert_eq!(names(&registry, &order), ["b0", "mcuboot", "app"]);
        assert_eq!(
            registry.get("mcuboot").unwrap().placement,
            Placement::before(&["app"])
        );
    }

    #[test]
    fn after_rules() {
        let mut registry = registry(&[
            ("x", Placement::before(&["t"])),
            ("s", Placement::after(&["app"])),
            ("y", Placement::after(&["s"])),
            ("t", Placement::before(&["app"])),
        ]);

        let order = solve_order(&mut registry).unwrap();

        assert_eq!(names(&registry, &order), ["x", "t", "app", "s", "y"]);
    }

    #[test]
    fn neighbours_of_adjacent_images_shift_instead_of_swapping() {
        let mut registry = registry(&[
            ("t", Placement::Last),
            ("x", Placement::before(&["t"])),
            ("y", Placement::after(&["s"])),
            ("s", Placement::after(&["app"])),
        ]);

        let order = solve_order(&mut registry).unwrap();

        assert_eq!(names(&registry, &order), ["app", "s", "y", "x", "t"]);
        assert!(valid_solution(&registry, &order).unwrap());
    }

    #[test]
    fn validity_of_given_orders() {
        let registry = registry(&[
            ("b0", Placement::before(&["mcuboot", "app"])),
            ("p", Placement::Last),
        ]);

        let valid = tokens(&registry, &["b0", "app", "p"]);
        let wrong_neighbour = tokens(&registry, &["app", "b0", "p"]);
        let not_last = tokens(&registry, &["b0", "p", "app"]);
        let incomplete = tokens(&registry, &["b0", "app"]);

        assert_eq!(valid_solution(&registry, &valid), Ok(true));
        assert_eq!(valid_solution(&registry, &wrong_neighbour), Ok(false));
        assert_eq!(valid_solution(&registry, &not_last), Ok(false));
        assert_eq!(valid_solution(&registry, &incomplete), Ok(false));
    }

    #[test]
    fn before_the_first_image_is_invalid() {
        let registry = registry(&[
            ("a", Placement::before(&["b"])),
            ("b", Placement::before(&["app"])),
        ]);

        let order = tokens(&registry, &["b", "app", "a"]);
        assert_eq!(valid_solution(&registry, &order), Ok(false));
    }

    #[test]
    fn two_last_images() {
        let mut registry = registry(&[("p", Placement::Last), ("q", Placement::Last)]);

        assert_eq!(
            solve_order(&mut registry),
            Err(LayoutError::MultipleLast {
                first: "p".to_string(),
                second: "q".to_string()
            })
        );
    }

    #[test]
    fn dangling_candidates() {
        let mut registry = registry(&[
            ("a", Placement::before(&["mcuboot"])),
            ("b", Placement::before(&["spu"])),
        ]);

        assert!(matches!(
            solve_order(&mut registry),
            Err(LayoutError::DanglingCandidates { .. })
        ));
    }

    #[test]
    fn dangling_candidates_in_validity_check() {
        let registry = registry(&[("a", Placement::after(&["nothing"]))]);
        let order = tokens(&registry, &["a", "app"]);

        assert_eq!(
            valid_solution(&registry, &order),
            Err(LayoutError::DanglingCandidates {
                image: "a".to_string(),
                candidates: vec!["nothing".to_string()]
            })
        );
    }

    #[test]
    fn self_reference() {
        let mut registry = registry(&[("a", Placement::before(&["a", "app"]))]);

        assert_eq!(
            solve_order(&mut registry),
            Err(LayoutError::SelfReference("a".to_string()))
        );
    }

    #[test]
    fn conflicting_neighbours_do_not_converge() {
        let mut registry = registry(&[
            ("x", Placement::before(&["app"])),
            ("y", Placement::before(&["app"])),
        ]);

        assert_eq!(
            solve_order(&mut registry),
            Err(LayoutError::NoConvergence {
                passes: max_passes(3)
            })
        );
    }

    #[test]
    fn cycle_does_not_converge() {
        let mut registry = registry(&[
            ("x", Placement::before(&["y"])),
            ("y", Placement::before(&["z"])),
            ("z", Placement::before(&["x"])),
        ]);

        assert!(matches!(
            solve_order(&mut registry),
            Err(LayoutError::NoConvergence { .. })
        ));
    }
}

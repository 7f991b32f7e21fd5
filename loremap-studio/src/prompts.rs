//! Prompt construction for the four remote operations.

use loremap_core::{GenerationMode, Language, LoreFile};

/// Per-mode framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeProfile {
    /// Who the model should act as.
    pub role: &'static str,
    /// Camera and projection constraints.
    pub viewpoint: &'static str,
    /// How to read an attached sketch.
    pub sketch_interpretation: &'static str,
    /// Things the output must not contain.
    pub negative: &'static str,
    /// What to spend detail on.
    pub focus: &'static str,
}

/// Framing for a generation mode.
#[must_use]
pub const fn mode_profile(mode: GenerationMode) -> ModeProfile {
    match mode {
        GenerationMode::Battlemap => ModeProfile {
            role: "Expert Battlemap Designer for Tabletop RPGs.",
            viewpoint: "STRICTLY ORTHOGRAPHIC TOP-DOWN (90-degree bird's eye view). Flat projection. NO isometric, NO perspective slant.",
            sketch_interpretation: "The sketch is a schematic layout guide (walls/obstacles).",
            negative: "Do NOT describe horizons, skies, vertical sides of walls, or isometric angles.",
            focus: "Focus on floor textures, ground details, and obstacles seen from above.",
        },
        GenerationMode::Location => ModeProfile {
            role: "Concept Artist and Environment Designer for Fantasy RPGs.",
            viewpoint: "Cinematic Perspective. Rule of thirds. Eye-level or establishing shot. Depth of field.",
            sketch_interpretation: "The sketch is a composition guide. Lines indicate horizon, main structures, or foreground elements.",
            negative: "Do NOT make it a top-down map.",
            focus: "Focus on atmosphere, lighting, scale, background details, and mood.",
        },
        GenerationMode::Character => ModeProfile {
            role: "Senior Character Concept Artist for RPGs.",
            viewpoint: "Character Portrait or Full Body Pose. Focus on anatomy and design.",
            sketch_interpretation: "The sketch is a POSE REFERENCE (stick figure or silhouette). The lines represent the character's limbs and posture.",
            negative: "Do NOT draw a map or a building. Do NOT leave the stick figure visible.",
            focus: "Focus on face details, clothing, armor texture, dynamic lighting on the figure.",
        },
    }
}

/// Known art style keys.
pub const STYLE_KEYS: [&str; 5] = ["realistic", "oldschool", "grimdark", "blueprint", "watercolor"];

/// Style description for `key`; unknown keys get `realistic`.
#[must_use]
pub fn style_description(key: &str) -> &'static str {
    match key {
        "oldschool" => "Old School Revival (OSR) style. Sepia parchment paper background, black ink line art, hand-drawn aesthetic, cross-hatching shading. Vintage feel.",
        "grimdark" => "Grimdark Dark Fantasy style. Low saturation, high contrast, gritty textures, deep shadows, dramatic lighting, moody and oppressive atmosphere.",
        "blueprint" => "Architectural/Technical Blueprint style. High contrast schematic. Clean lines, technical drawing aesthetic. Minimalist details.",
        "watercolor" => "Artistic Watercolor Painting style. Soft brush strokes, paper texture visible, paint bleeding effects, dreamy and atmospheric, soft edges.",
        _ => "High-End Digital Art. Photorealistic 3D render aesthetics. Volumetric lighting, ambient occlusion, deep shadows, high contrast, rich vibrant colors. Sharp 4K textures. Cinematic atmosphere. NOT flat, NOT washed out.",
    }
}

/// Lore files as one context block.
#[must_use]
pub fn lore_context(files: &[LoreFile]) -> String {
    files
        .iter()
        .map(|f| format!("--- File: {} ---\n{}\n", f.name, f.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt for the visual description stage.
#[must_use]
pub fn description_prompt(
    lore: &[LoreFile],
    request: &str,
    has_sketch: bool,
    mode: GenerationMode,
    style: &str,
) -> String {
    let profile = mode_profile(mode);
    let sketch = if has_sketch {
        format!(
            "3. Sketch: {} Use it as the primary structure.",
            profile.sketch_interpretation
        )
    } else {
        "3. Sketch: No sketch provided. Generate based on text solely.".to_string()
    };
    format!(
        "Role: {role}\n\
         \n\
         Task: Write a highly detailed visual prompt for an image generation AI.\n\
         \n\
         Input Context:\n\
         1. World Lore: History and atmosphere.\n\
         2. User Request: {request}\n\
         {sketch}\n\
         \n\
         Instructions:\n\
         - Analyze the Lore to ensure consistency (race, culture, biome).\n\
         - Combine Lore + Request into a vivid description.\n\
         - VIEWPOINT: {viewpoint}\n\
         - NEGATIVE CONSTRAINTS: {negative}\n\
         - ART STYLE: {style}\n\
         - FOCUS: {focus}\n\
         \n\
         IMPORTANT OUTPUT RULES (STRICT):\n\
         1. OUTPUT LANGUAGE MUST BE ENGLISH ONLY. Even if input is Russian.\n\
         2. OUTPUT RAW TEXT ONLY.\n\
         3. ABSOLUTELY NO INTRODUCTIONS (e.g., \"Here is the prompt\", \"Below is...\").\n\
         4. NO MARKDOWN HEADERS, NO conversational filler.\n\
         5. JUST RETURN THE PROMPT TEXT.\n\
         \n\
         User Request: \"{request}\"\n\
         \n\
         Lore Content:\n\
         {lore}",
        role = profile.role,
        viewpoint = profile.viewpoint,
        negative = profile.negative,
        style = style_description(style),
        focus = profile.focus,
        lore = lore_context(lore),
    )
}

/// Prompt for the read-aloud narrative.
#[must_use]
pub fn narrative_prompt(
    lore: &[LoreFile],
    request: &str,
    mode: GenerationMode,
    language: Language,
) -> String {
    format!(
        "Role: Expert Dungeon Master and Storyteller.\n\
         Task: Write a short, immersive, atmospheric description of the following scene to be read aloud to players.\n\
         \n\
         Context:\n\
         Mode: {mode}\n\
         User Request: \"{request}\"\n\
         \n\
         Lore Context (Optional, use if relevant):\n\
         {lore}\n\
         \n\
         Instructions:\n\
         1. LANGUAGE: The user prefers language: \"{language}\". Write your response in THIS language.\n\
         2. TONE: Immersive, sensory (smells, sounds, lighting), and dramatic.\n\
         3. LENGTH: 1-2 paragraphs. Concise but evocative.\n\
         4. CONTENT: Describe what the characters see/feel. Do not mention \"polygons\" or \"pixels\". Treat it as real.",
        lore = lore_context(lore),
        language = language.display_name(),
    )
}

/// Prompt for rendering one image from a description.
#[must_use]
pub fn render_prompt(
    description: &str,
    has_sketch: bool,
    mode: GenerationMode,
    style: &str,
) -> String {
    let profile = mode_profile(mode);
    let mut prompt = format!(
        "STYLE: {style}\n\
         VIEWPOINT: {viewpoint}\n\
         \n\
         VISUAL DESCRIPTION:\n\
         {description}\n\
         \n\
         INSTRUCTIONS:\n\
         1. RENDER: High quality art matching the style and perspective.\n",
        style = style_description(style),
        viewpoint = profile.viewpoint,
    );
    if has_sketch {
        prompt.push_str(&format!(
            "\nINPUT INTERPRETATION:\n\
             The attached image is a strict layout/pose guide on a black background.\n\
             {}\n\
             2. GEOMETRY/POSE: Follow the white lines of the sketch exactly for placement/pose.\n\
             3. CLEANUP: Replace the white sketch lines with realistic high-quality art. DO NOT leave the white lines visible.\n",
            profile.sketch_interpretation
        ));
    }
    prompt
}

/// Prompt for editing an existing image.
#[must_use]
pub fn edit_prompt(instruction: &str, mode: GenerationMode, style: &str) -> String {
    format!(
        "Edit this Image: {instruction}.\n\
         STRICT CONSTRAINT: Maintain the original perspective ({viewpoint}).\n\
         STYLE: {style}.\n\
         Maintain original layout/pose. High quality, seamless blend.",
        viewpoint = mode_profile(mode).viewpoint,
        style = style_description(style),
    )
}

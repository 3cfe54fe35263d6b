use indoc::indoc;

pub const DIRECT_PROMPT: &str = concat!(
    "A photorealistic image of a young girl, around 4 years old, with light skin and slightly ",
    "messy shoulder-length brown hair, standing close to the camera in the foreground. ",
    "She is giving a subtle, mischievous smirk while glancing sideways at the viewer. ",
    "In the background, a suburban house is fully engulfed in flames, with bright orange fire ",
    "and thick black smoke rising into the overcast sky. ",
    "Firefighters and bystanders stand near the house. ",
    "A large white fire truck is present with firefighters working on it. ",
    "Yellow fire hoses are stretched across a residential street. ",
    "The scene is framed like an early 2000s candid photo, with a shallow depth of field that ",
    "keeps the girl in sharp focus while the fire and firefighters are slightly blurred."
);

pub const DIRECT_NEGATIVE_PROMPT: &str = concat!(
    "older girl, centered pose, hands on hips, modern fire truck only, extra limbs, ",
    "cartoonish style, low resolution, fantasy elements, futuristic elements, text overlay, watermark"
);

pub const AGENT_INSTRUCTIONS: &str = indoc! {"
    You are an expert at creating detailed prompts for Stable Diffusion that will generate
    images similar to the disaster girl meme. The disaster girl meme features a young girl
    with a mischievous smirk while a house burns in the background.
    Generate both a positive prompt that describes the desired image in detail and a negative
    prompt that specifies what to avoid. Be very specific about the composition, lighting,
    and style to match the original meme's aesthetic.
"};

pub const AGENT_REQUEST: &str =
    "Generate an image similar to the disaster girl meme using Stable Diffusion.";
